use crate::config::{
    Config, ConfigError, ExitStyle, Indicator, IndicatorSpec, LiveConfig, TradeConfig,
};
use crate::decision::decide;
use crate::engine::simulator::ExitLevels;
use crate::live::broker::{BrokerAdapter, LivePosition};
use crate::live::fetch::{IndicatorSource, Proxy, ProxyRotation};
use std::thread;
use std::time::Duration;

//hold time for a timed close when the indicator row does not configure one
const DEFAULT_TIMED_CLOSE_HOLD_SECS: u64 = 1_500;

//what a live run ended with
#[derive(Debug, Clone, PartialEq)]
pub enum LiveOutcome {
    //a value was fetched but the surprise was inside the threshold band
    NoTrade { value: f64 },
    //a position was opened; closed is true when a timed close went through
    Traded { position: LivePosition, closed: bool },
    //the broker rejected the opening call
    Failed { value: f64, error: String },
    //polling ended without a published value (single-shot mode)
    Exhausted { attempts: usize },
    //this session already fired its strategy
    AlreadyExecuted,
}

//one live strategy run: polls for a published indicator value, then fires
//the trading strategy exactly once
//
//all mutable run state (proxy rotation cursor, executed-once flag, the last
//opened position) lives on the session, so concurrent strategy instances
//never share anything; the executed flag is checked at tick start and is the
//guard against double-execution
pub struct LiveSession {
    indicator: Indicator,
    spec: IndicatorSpec,
    trade: TradeConfig,
    live: LiveConfig,
    rotation: ProxyRotation,
    executed: bool,
    position: Option<LivePosition>,
}

impl LiveSession {
    pub fn new(
        config: &Config,
        indicator: Indicator,
        proxies: Vec<Proxy>,
    ) -> Result<Self, ConfigError> {
        let spec = config.spec_for(indicator.as_str())?.clone();

        let rotation = if config.live.proxyless {
            ProxyRotation::proxyless()
        } else {
            ProxyRotation::new(proxies)
        };

        Ok(LiveSession {
            indicator,
            spec,
            trade: config.trade.clone(),
            live: config.live.clone(),
            rotation,
            executed: false,
            position: None,
        })
    }

    //the position opened by this session, if any
    pub fn position(&self) -> Option<&LivePosition> {
        self.position.as_ref()
    }

    //polls the source until a value is published, then executes the strategy
    //
    //a transport failure counts as "no value yet": the next tick rotates to
    //the next proxy and retries. single-shot mode stops after one attempt.
    pub fn run(
        &mut self,
        source: &mut dyn IndicatorSource,
        broker: &mut dyn BrokerAdapter,
    ) -> LiveOutcome {
        let mut attempts = 0usize;

        loop {
            if self.executed {
                return LiveOutcome::AlreadyExecuted;
            }

            attempts += 1;

            let fetched = {
                let proxy = self.rotation.next_proxy();
                match proxy {
                    Some(p) => println!(
                        "[{}] attempt {} via proxy {}",
                        self.indicator.as_str(),
                        attempts,
                        p.endpoint()
                    ),
                    None => println!("[{}] attempt {} direct", self.indicator.as_str(), attempts),
                }
                source.fetch(proxy)
            };

            match fetched {
                Ok(Some(value)) => {
                    self.executed = true;
                    println!("[{}] published value {}", self.indicator.as_str(), value);
                    return self.execute(value, broker);
                }
                Ok(None) => {
                    println!("[{}] not yet published", self.indicator.as_str());
                }
                Err(err) => {
                    println!("[{}] fetch failed: {}", self.indicator.as_str(), err);
                }
            }

            if self.live.single_shot {
                return LiveOutcome::Exhausted { attempts };
            }

            thread::sleep(Duration::from_secs(self.live.poll_interval_secs));
        }
    }

    //turns the published value into a position through the broker adapter
    fn execute(&mut self, value: f64, broker: &mut dyn BrokerAdapter) -> LiveOutcome {
        let max_leverage = self.trade.max_leverage();
        let Some(decision) = decide(value, self.spec.threshold, &self.spec, max_leverage) else {
            println!(
                "[{}] no action, inside threshold band (value {}, expected {})",
                self.indicator.as_str(),
                value,
                self.spec.threshold
            );
            return LiveOutcome::NoTrade { value };
        };

        let amount_base = self.trade.base_amount * decision.leverage.abs() as f64;
        println!(
            "[{}] opening {} position, leverage {:+}, notional {:.2}",
            self.indicator.as_str(),
            decision.direction.action_str(),
            decision.leverage,
            amount_base
        );

        let opened = match broker.open_position(decision.direction, amount_base) {
            Ok(opened) => opened,
            Err(err) => {
                println!("[{}] open failed: {}", self.indicator.as_str(), err);
                return LiveOutcome::Failed {
                    value,
                    error: err.to_string(),
                };
            }
        };

        let mut position = LivePosition {
            id: opened.id.clone(),
            direction: decision.direction,
            open_price: opened.open_price,
            quantity: opened.quantity,
            amount_base,
            stop_order: None,
            target_order: None,
        };
        let mut closed = false;

        match self.live.exit_style {
            ExitStyle::ProtectiveOrders => {
                //levels derive from the actual fill, not the pre-trade reference
                let levels =
                    ExitLevels::for_entry(decision.direction, opened.open_price, &self.trade);

                match broker.attach_target_order(&position.id, levels.take_profit, opened.quantity)
                {
                    Ok(()) => position.target_order = Some(levels.take_profit),
                    Err(err) => {
                        println!("[{}] target attach failed: {}", self.indicator.as_str(), err)
                    }
                }

                match broker.attach_stop_order(&position.id, levels.stop_loss, opened.quantity) {
                    Ok(()) => position.stop_order = Some(levels.stop_loss),
                    Err(err) => {
                        println!("[{}] stop attach failed: {}", self.indicator.as_str(), err)
                    }
                }
            }
            ExitStyle::TimedClose => {
                let hold = self
                    .spec
                    .max_hold_secs
                    .unwrap_or(DEFAULT_TIMED_CLOSE_HOLD_SECS);
                thread::sleep(Duration::from_secs(hold));

                match broker.current_price() {
                    Ok(quote) => match broker.close_position(&position.id, quote.price_ref) {
                        Ok(()) => closed = true,
                        Err(err) => {
                            println!("[{}] close failed: {}", self.indicator.as_str(), err)
                        }
                    },
                    Err(err) => println!(
                        "[{}] price fetch for close failed: {}",
                        self.indicator.as_str(),
                        err
                    ),
                }
            }
        }

        self.position = Some(position.clone());
        LiveOutcome::Traded { position, closed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::Direction;
    use crate::live::broker::{BrokerError, OpenedPosition, PriceQuote};
    use crate::live::fetch::FetchError;
    use approx::assert_relative_eq;
    use std::collections::VecDeque;

    //replays a scripted fetch sequence and records which proxy served each call
    struct ScriptedSource {
        script: VecDeque<Result<Option<f64>, FetchError>>,
        served_by: Vec<Option<String>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Option<f64>, FetchError>>) -> Self {
            ScriptedSource {
                script: script.into(),
                served_by: Vec::new(),
            }
        }
    }

    impl IndicatorSource for ScriptedSource {
        fn fetch(&mut self, proxy: Option<&Proxy>) -> Result<Option<f64>, FetchError> {
            self.served_by.push(proxy.map(|p| p.endpoint()));
            self.script.pop_front().unwrap_or(Ok(None))
        }
    }

    //records every call; individual calls can be made to fail
    #[derive(Default)]
    struct RecordingBroker {
        opened: Vec<(Direction, f64)>,
        stops: Vec<(String, f64, f64)>,
        targets: Vec<(String, f64, f64)>,
        closes: Vec<(String, f64)>,
        fail_open: bool,
        fail_attach: bool,
        fill_price: f64,
    }

    impl RecordingBroker {
        fn with_fill(fill_price: f64) -> Self {
            RecordingBroker {
                fill_price,
                ..RecordingBroker::default()
            }
        }
    }

    impl BrokerAdapter for RecordingBroker {
        fn open_position(
            &mut self,
            direction: Direction,
            amount_base: f64,
        ) -> Result<OpenedPosition, BrokerError> {
            if self.fail_open {
                return Err(BrokerError::Rejected {
                    call: "open_position",
                    reason: "insufficient margin".to_string(),
                });
            }
            self.opened.push((direction, amount_base));
            Ok(OpenedPosition {
                id: format!("pos-{}", self.opened.len()),
                open_price: self.fill_price,
                quantity: amount_base / self.fill_price,
            })
        }

        fn attach_stop_order(
            &mut self,
            position_id: &str,
            price: f64,
            quantity: f64,
        ) -> Result<(), BrokerError> {
            if self.fail_attach {
                return Err(BrokerError::Transport("timeout".to_string()));
            }
            self.stops.push((position_id.to_string(), price, quantity));
            Ok(())
        }

        fn attach_target_order(
            &mut self,
            position_id: &str,
            price: f64,
            quantity: f64,
        ) -> Result<(), BrokerError> {
            if self.fail_attach {
                return Err(BrokerError::Transport("timeout".to_string()));
            }
            self.targets.push((position_id.to_string(), price, quantity));
            Ok(())
        }

        fn close_position(
            &mut self,
            position_id: &str,
            price_ref: f64,
        ) -> Result<(), BrokerError> {
            self.closes.push((position_id.to_string(), price_ref));
            Ok(())
        }

        fn current_price(&mut self) -> Result<PriceQuote, BrokerError> {
            Ok(PriceQuote {
                bid: self.fill_price - 1.0,
                ask: self.fill_price + 1.0,
                price_ref: self.fill_price,
            })
        }
    }

    fn proxy(address: &str) -> Proxy {
        Proxy {
            address: address.to_string(),
            port: 8080,
            username: None,
            password: None,
        }
    }

    //cpi expectation 1.3, offset 0.2, inverse; instant polling for tests
    fn test_config() -> Config {
        let mut config = Config::default();
        config.indicators.insert(
            "cpi".to_string(),
            IndicatorSpec {
                threshold: 1.3,
                offset: 0.2,
                direct: false,
                max_hold_secs: Some(0),
            },
        );
        config.live.poll_interval_secs = 0;
        config
    }

    #[test]
    fn polls_until_published_and_rotates_proxies() {
        let config = test_config();
        let mut session = LiveSession::new(
            &config,
            Indicator::Cpi,
            vec![proxy("a"), proxy("b")],
        )
        .unwrap();

        let mut source = ScriptedSource::new(vec![
            Err(FetchError::Transport("connection reset".to_string())),
            Ok(None),
            Ok(Some(3.5)),
        ]);
        let mut broker = RecordingBroker::with_fill(60_000.0);

        let outcome = session.run(&mut source, &mut broker);

        //transport failures and unpublished values both retry on the next proxy
        assert_eq!(
            source.served_by,
            vec![
                Some("a:8080".to_string()),
                Some("b:8080".to_string()),
                Some("a:8080".to_string())
            ]
        );

        //surprise 2.2 / 0.2 = 11, clamp 5, inverse: short, notional 5x base
        let position = match outcome {
            LiveOutcome::Traded { position, closed } => {
                assert!(!closed);
                position
            }
            other => panic!("expected a trade, got {:?}", other),
        };
        assert_eq!(broker.opened, vec![(Direction::Short, 1_000_000.0)]);
        assert_eq!(position.direction, Direction::Short);

        //protective orders derive from the actual fill
        assert_relative_eq!(position.target_order.unwrap(), 58_800.0);
        assert_relative_eq!(position.stop_order.unwrap(), 60_120.0);
        assert_eq!(broker.targets.len(), 1);
        assert_eq!(broker.stops.len(), 1);
        assert_relative_eq!(broker.stops[0].2, 1_000_000.0 / 60_000.0);
    }

    #[test]
    fn fires_exactly_once() {
        let config = test_config();
        let mut session =
            LiveSession::new(&config, Indicator::Cpi, Vec::new()).unwrap();

        let mut source = ScriptedSource::new(vec![Ok(Some(3.5)), Ok(Some(3.5))]);
        let mut broker = RecordingBroker::with_fill(60_000.0);

        let first = session.run(&mut source, &mut broker);
        assert!(matches!(first, LiveOutcome::Traded { .. }));
        assert!(session.position().is_some());

        let second = session.run(&mut source, &mut broker);
        assert_eq!(second, LiveOutcome::AlreadyExecuted);
        assert_eq!(broker.opened.len(), 1);
    }

    #[test]
    fn dead_zone_value_trades_nothing() {
        let config = test_config();
        let mut session =
            LiveSession::new(&config, Indicator::Cpi, Vec::new()).unwrap();

        let mut source = ScriptedSource::new(vec![Ok(Some(1.35))]);
        let mut broker = RecordingBroker::with_fill(60_000.0);

        let outcome = session.run(&mut source, &mut broker);

        assert_eq!(outcome, LiveOutcome::NoTrade { value: 1.35 });
        assert!(broker.opened.is_empty());
        assert!(session.position().is_none());
    }

    #[test]
    fn single_shot_stops_after_one_attempt() {
        let mut config = test_config();
        config.live.single_shot = true;

        let mut session =
            LiveSession::new(&config, Indicator::Cpi, Vec::new()).unwrap();

        let mut source = ScriptedSource::new(vec![Ok(None), Ok(Some(3.5))]);
        let mut broker = RecordingBroker::with_fill(60_000.0);

        let outcome = session.run(&mut source, &mut broker);

        assert_eq!(outcome, LiveOutcome::Exhausted { attempts: 1 });
        assert!(broker.opened.is_empty());
    }

    #[test]
    fn open_rejection_is_reported_not_fatal() {
        let config = test_config();
        let mut session =
            LiveSession::new(&config, Indicator::Cpi, Vec::new()).unwrap();

        let mut source = ScriptedSource::new(vec![Ok(Some(3.5))]);
        let mut broker = RecordingBroker::with_fill(60_000.0);
        broker.fail_open = true;

        let outcome = session.run(&mut source, &mut broker);

        match outcome {
            LiveOutcome::Failed { value, error } => {
                assert_eq!(value, 3.5);
                assert!(error.contains("insufficient margin"));
            }
            other => panic!("expected a failed outcome, got {:?}", other),
        }
    }

    #[test]
    fn attach_failure_leaves_order_unset() {
        let config = test_config();
        let mut session =
            LiveSession::new(&config, Indicator::Cpi, Vec::new()).unwrap();

        let mut source = ScriptedSource::new(vec![Ok(Some(3.5))]);
        let mut broker = RecordingBroker::with_fill(60_000.0);
        broker.fail_attach = true;

        let outcome = session.run(&mut source, &mut broker);

        match outcome {
            LiveOutcome::Traded { position, .. } => {
                assert!(position.stop_order.is_none());
                assert!(position.target_order.is_none());
            }
            other => panic!("expected a trade, got {:?}", other),
        }
    }

    #[test]
    fn timed_close_exits_through_the_broker() {
        let mut config = test_config();
        config.live.exit_style = ExitStyle::TimedClose;

        let mut session =
            LiveSession::new(&config, Indicator::Cpi, Vec::new()).unwrap();

        let mut source = ScriptedSource::new(vec![Ok(Some(3.5))]);
        let mut broker = RecordingBroker::with_fill(60_000.0);

        let outcome = session.run(&mut source, &mut broker);

        match outcome {
            LiveOutcome::Traded { position, closed } => {
                assert!(closed);
                assert_eq!(broker.closes, vec![(position.id.clone(), 60_000.0)]);
                assert!(position.stop_order.is_none());
            }
            other => panic!("expected a trade, got {:?}", other),
        }
    }

    #[test]
    fn proxyless_config_ignores_the_proxy_list() {
        let mut config = test_config();
        config.live.proxyless = true;

        let mut session = LiveSession::new(
            &config,
            Indicator::Cpi,
            vec![proxy("a"), proxy("b")],
        )
        .unwrap();

        let mut source = ScriptedSource::new(vec![Ok(Some(3.5))]);
        let mut broker = RecordingBroker::with_fill(60_000.0);

        session.run(&mut source, &mut broker);

        assert_eq!(source.served_by, vec![None]);
    }
}
