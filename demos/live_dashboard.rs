use chapter_live::telemetry;
use chapter_live::websocket::{ConnectionState, ServerMessage};
use chapter_live::{ClientConfig, LiveSession};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init_tracing();

    let config = ClientConfig::load()?;
    let session = LiveSession::new(config)?;

    println!("Connecting to {}...", session.config().ws_url);

    session.monitor().start();

    session.subscribe("NEW_NOTIFICATION", |message| {
        if let ServerMessage::NewNotification(n) = message {
            println!("[Notification] {}", n.title.as_deref().unwrap_or("(untitled)"));
            if let Some(body) = &n.message {
                println!("  {}", body);
            }
        }
    });
    session.subscribe("MEMBER_ACTIVITY", |message| {
        if let ServerMessage::MemberActivity(activity) = message {
            println!(
                "[Activity] {}: {}",
                activity.kind.as_deref().unwrap_or("unknown"),
                activity.message.as_deref().unwrap_or("")
            );
        }
    });

    session.connect();

    let mut status = session.watch_status();
    let mut changes = session.store().changes();
    let mut monitor_tick = tokio::time::interval(session.monitor().config().refresh_interval);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            Ok(()) = status.changed() => {
                let current = status.borrow_and_update().clone();
                match current.state {
                    ConnectionState::Open => println!("✅ Connected"),
                    ConnectionState::Disconnected if current.is_terminal() => {
                        eprintln!(
                            "❌ Giving up: {}",
                            current.error.as_deref().unwrap_or("unknown error")
                        );
                        break;
                    }
                    ConnectionState::Disconnected if current.reconnect_pending => {
                        println!("Reconnecting (attempt {})...", current.reconnect_attempts);
                    }
                    _ => {}
                }
            }
            _ = monitor_tick.tick() => {
                let state = session.monitor().state();
                println!(
                    "Backend: {}  Active events: {}  RSVPs: {}",
                    state.health_state().description(),
                    state.metrics.active_events,
                    state.metrics.total_rsvps
                );
                if let Some(trend) = session.monitor().trend("totalRsvps", 5) {
                    println!("  RSVP trend: {:+.1}% ({:?})", trend.change, trend.direction);
                }
                if let Some(error) = &state.error {
                    eprintln!("⚠️  Monitoring: {}", error);
                }
            }
            Ok(()) = changes.changed() => {
                let metrics = session.store().metrics();
                println!(
                    "Active users: {}  Ongoing events: {}  Health: {}%{}",
                    metrics.active_users,
                    metrics.ongoing_events,
                    metrics.system_health,
                    if metrics.is_healthy() { "" } else { " ⚠️" }
                );
            }
        }
    }

    println!("\nShutting down...");
    session.shutdown().await;
    println!("Unread notifications: {}", session.inbox().unread_count());

    Ok(())
}
