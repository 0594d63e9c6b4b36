//! Per-connection WebSocket session
//!
//! Each socket is split into a writer task draining the connection's
//! outbound queue and a reader loop dispatching client commands. Replies and
//! fan-out pushes share the same queue, so a client sees them in send order.

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use stockwatch_alerts::ChannelId;
use stockwatch_core::{AlertThreshold, Identity, ServerEvent, Ticker, TradeView, WatchlistView};
use stockwatch_ledger::{value, TradeOrder};

use crate::protocol::{ClientMessage, SessionError, SessionResult};
use crate::rate_limit::RateLimitResult;
use crate::service::AppService;

/// Command state of one connection
pub struct Session {
    channel: ChannelId,
    peer: IpAddr,
    identity: Option<Identity>,
    service: Arc<AppService>,
}

impl Session {
    pub fn new(channel: ChannelId, peer: IpAddr, service: Arc<AppService>) -> Self {
        Self {
            channel,
            peer,
            identity: None,
            service,
        }
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Handle one text frame; errors become an `error` event
    pub async fn handle_text(&mut self, text: &str) -> ServerEvent {
        let result = match ClientMessage::parse(text) {
            Ok(message) => self.dispatch(message).await,
            Err(e) => Err(e),
        };

        result.unwrap_or_else(|e| {
            debug!("{} command failed: {}", self.channel, e);
            ServerEvent::error(e.to_string())
        })
    }

    pub async fn dispatch(&mut self, message: ClientMessage) -> SessionResult<ServerEvent> {
        let identity = match (&self.identity, message.requires_session()) {
            (Some(identity), _) => Some(identity.clone()),
            (None, true) => return Err(SessionError::NotRegistered),
            (None, false) => None,
        };

        match (message, identity) {
            (ClientMessage::Register { email }, _) => self.register(&email).await,
            (ClientMessage::Ping, _) => Ok(ServerEvent::Pong {
                timestamp: Utc::now().timestamp_millis(),
            }),
            (ClientMessage::Subscribe { tickers }, Some(identity)) => {
                let tickers = tickers
                    .iter()
                    .map(|t| t.parse::<Ticker>())
                    .collect::<Result<BTreeSet<_>, _>>()?;
                let watchlist = self
                    .service
                    .store()
                    .set_subscriptions(&identity, tickers)
                    .await?;
                Ok(ServerEvent::Watchlist(WatchlistView::from(&watchlist)))
            }
            (ClientMessage::SetAlert { ticker, above, below }, Some(identity)) => {
                let positive = |bound: Option<Decimal>| bound.map_or(true, |b| b > Decimal::ZERO);
                if !positive(above) || !positive(below) {
                    return Err(SessionError::InvalidThreshold);
                }
                self.update_threshold(&identity, &ticker, AlertThreshold { above, below })
                    .await
            }
            (ClientMessage::ClearAlert { ticker }, Some(identity)) => {
                self.update_threshold(&identity, &ticker, AlertThreshold::default())
                    .await
            }
            (ClientMessage::Trade { ticker, side, quantity }, Some(identity)) => {
                let order = TradeOrder {
                    ticker: ticker.parse()?,
                    side,
                    quantity,
                };
                let (trade, portfolio) = self
                    .service
                    .executor()
                    .execute_for(
                        self.service.store().as_ref(),
                        &identity,
                        &order,
                        self.service.book(),
                    )
                    .await?;
                Ok(ServerEvent::TradeExecuted {
                    trade: TradeView::from(&trade),
                    portfolio: value(&portfolio, &self.service.book().snapshot()),
                })
            }
            (ClientMessage::Portfolio, Some(identity)) => {
                let portfolio = self.service.store().portfolio(&identity).await?;
                Ok(ServerEvent::Portfolio(value(
                    &portfolio,
                    &self.service.book().snapshot(),
                )))
            }
            (_, None) => Err(SessionError::NotRegistered),
        }
    }

    async fn register(&mut self, email: &str) -> SessionResult<ServerEvent> {
        if let RateLimitResult::Denied { retry_after } = self.service.limiter().check(self.peer) {
            warn!("Login rate limit hit for {}", self.peer);
            return Err(SessionError::RateLimited(retry_after.as_secs().max(1)));
        }

        let identity = Identity::from_email(email)?;
        let record = self.service.store().find_or_create(&identity).await?;

        // Switching identity on a live channel drops the old mapping first
        if self.identity.as_ref().is_some_and(|current| *current != identity) {
            self.service.registry().unregister(self.channel);
        }
        self.service.registry().register(identity.clone(), self.channel);

        info!(
            target: "audit",
            identity = %identity,
            channel = %self.channel,
            peer = %self.peer,
            "Session registered"
        );

        let event = ServerEvent::Session {
            email: identity.to_string(),
            watchlist: WatchlistView::from(&record.watchlist),
            portfolio: value(&record.portfolio, &self.service.book().snapshot()),
        };
        self.identity = Some(identity);
        Ok(event)
    }

    async fn update_threshold(
        &self,
        identity: &Identity,
        ticker: &str,
        threshold: AlertThreshold,
    ) -> SessionResult<ServerEvent> {
        let ticker: Ticker = ticker.parse()?;
        let store = self.service.store();

        let mut watchlist = store.watchlist(identity).await?;
        watchlist.set_threshold(ticker, threshold);
        let watchlist = store
            .set_alert_thresholds(identity, watchlist.alerts)
            .await?;

        Ok(ServerEvent::Watchlist(WatchlistView::from(&watchlist)))
    }
}

/// Serve one accepted TCP connection until it closes
pub async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    service: Arc<AppService>,
) -> anyhow::Result<()> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut sink, mut source) = ws.split();

    let channel = ChannelId::generate();
    let (outbound, rx) = mpsc::channel::<ServerEvent>(service.config().server.channel_buffer);
    service.hub().attach(channel, outbound.clone());
    debug!("{} connected from {}", channel, peer);

    let writer = tokio::spawn(async move {
        let mut events = ReceiverStream::new(rx);
        while let Some(event) = events.next().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    warn!("Failed to serialize {} event: {}", event.name(), e);
                    continue;
                }
            };
            if sink.send(Message::Text(json)).await.is_err() {
                break; // Client disconnected
            }
        }
        let _ = sink.close().await;
    });

    let mut session = Session::new(channel, peer.ip(), Arc::clone(&service));

    while let Some(frame) = source.next().await {
        let reply = match frame {
            Ok(Message::Text(text)) => session.handle_text(&text).await,
            Ok(Message::Binary(_)) => ServerEvent::error("Binary frames are not supported"),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue, // Ping/pong handled by tungstenite
            Err(e) => {
                debug!("{} read error: {}", channel, e);
                break;
            }
        };

        if outbound.send(reply).await.is_err() {
            break;
        }
    }

    service.registry().unregister(channel);
    service.hub().detach(channel);
    drop(outbound);
    let _ = writer.await;

    debug!(
        "{} disconnected ({})",
        channel,
        session.identity().map(|i| i.as_str()).unwrap_or("anonymous")
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use stockwatch_core::{AppConfig, RateLimitConfig};
    use stockwatch_store::MemoryStore;

    fn session_with(config: AppConfig) -> Session {
        let store = Arc::new(MemoryStore::new(config.store.starting_cash));
        let service = Arc::new(AppService::with_store(config, store));
        Session::new(ChannelId::generate(), "127.0.0.1".parse().unwrap(), service)
    }

    async fn send(session: &mut Session, frame: Value) -> Value {
        let event = session.handle_text(&frame.to_string()).await;
        serde_json::to_value(event).unwrap()
    }

    #[tokio::test]
    async fn test_commands_require_register() {
        let mut session = session_with(AppConfig::default());

        let reply = send(&mut session, json!({"type": "subscribe", "tickers": ["GOOG"]})).await;
        assert_eq!(reply["event"], "error");

        let reply = send(&mut session, json!({"type": "ping"})).await;
        assert_eq!(reply["event"], "pong");
        assert!(reply["data"]["timestamp"].is_i64());
    }

    #[tokio::test]
    async fn test_register_returns_session() {
        let mut session = session_with(AppConfig::default());

        let reply = send(&mut session, json!({"type": "register", "email": " Trader@X.io "})).await;

        assert_eq!(reply["event"], "session");
        assert_eq!(reply["data"]["email"], "trader@x.io");
        assert_eq!(reply["data"]["watchlist"]["subscriptions"], json!([]));
        assert_eq!(reply["data"]["portfolio"]["cash"], "10000.00");

        let identity = Identity::from_email("trader@x.io").unwrap();
        assert_eq!(
            session.service.registry().channel_for(&identity),
            Some(session.channel())
        );
    }

    #[tokio::test]
    async fn test_invalid_email_and_unknown_ticker() {
        let mut session = session_with(AppConfig::default());

        let reply = send(&mut session, json!({"type": "register", "email": "nobody"})).await;
        assert_eq!(reply["event"], "error");
        assert!(session.identity().is_none());

        send(&mut session, json!({"type": "register", "email": "a@x.io"})).await;
        let reply = send(&mut session, json!({"type": "subscribe", "tickers": ["GOOG", "AAPL"]})).await;
        assert_eq!(reply["event"], "error");
        assert_eq!(reply["data"]["message"], "Unknown ticker: AAPL");
    }

    #[tokio::test]
    async fn test_subscribe_and_alerts() {
        let mut session = session_with(AppConfig::default());
        send(&mut session, json!({"type": "register", "email": "a@x.io"})).await;

        let reply = send(&mut session, json!({"type": "subscribe", "tickers": ["tsla", "goog"]})).await;
        assert_eq!(reply["data"]["subscriptions"], json!(["GOOG", "TSLA"]));

        let reply = send(
            &mut session,
            json!({"type": "setAlert", "ticker": "TSLA", "above": 500}),
        )
        .await;
        assert_eq!(reply["data"]["alerts"], json!({"TSLA": {"above": "500.00"}}));

        let reply = send(&mut session, json!({"type": "setAlert", "ticker": "TSLA", "below": -1})).await;
        assert_eq!(reply["event"], "error");

        let reply = send(&mut session, json!({"type": "clearAlert", "ticker": "TSLA"})).await;
        assert_eq!(reply["data"]["alerts"], json!({}));
    }

    #[tokio::test]
    async fn test_trade_and_portfolio() {
        let mut session = session_with(AppConfig::default());
        send(&mut session, json!({"type": "register", "email": "a@x.io"})).await;

        let reply = send(
            &mut session,
            json!({"type": "trade", "ticker": "GOOG", "side": "buy", "quantity": 10}),
        )
        .await;
        assert_eq!(reply["event"], "tradeExecuted");
        assert_eq!(reply["data"]["trade"]["price"], "140.00");
        assert_eq!(reply["data"]["trade"]["total"], "1400.00");
        assert_eq!(reply["data"]["portfolio"]["cash"], "8600.00");

        let reply = send(
            &mut session,
            json!({"type": "trade", "ticker": "GOOG", "side": "sell", "quantity": 11}),
        )
        .await;
        assert_eq!(reply["event"], "error");

        let reply = send(&mut session, json!({"type": "portfolio"})).await;
        assert_eq!(reply["event"], "portfolio");
        assert_eq!(reply["data"]["holdings"]["GOOG"]["quantity"], 10);
        assert_eq!(reply["data"]["totalValue"], "10000.00");
    }

    #[tokio::test]
    async fn test_register_is_rate_limited() {
        let config = AppConfig {
            rate_limit: RateLimitConfig {
                enabled: true,
                max_attempts: 2,
                window_secs: 60,
            },
            ..Default::default()
        };
        let mut session = session_with(config);

        for _ in 0..2 {
            let reply = send(&mut session, json!({"type": "register", "email": "a@x.io"})).await;
            assert_eq!(reply["event"], "session");
        }
        let reply = send(&mut session, json!({"type": "register", "email": "a@x.io"})).await;
        assert_eq!(reply["event"], "error");
        assert!(reply["data"]["message"]
            .as_str()
            .unwrap()
            .starts_with("Too many login attempts"));
    }

    #[tokio::test]
    async fn test_switching_identity_moves_registration() {
        let mut session = session_with(AppConfig::default());
        send(&mut session, json!({"type": "register", "email": "first@x.io"})).await;
        send(&mut session, json!({"type": "register", "email": "second@x.io"})).await;

        let registry = session.service.registry();
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.channel_for(&Identity::from_email("second@x.io").unwrap()),
            Some(session.channel())
        );
        assert_eq!(session.identity().map(|i| i.as_str()), Some("second@x.io"));
    }
}
