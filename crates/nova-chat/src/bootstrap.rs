//! Session bootstrap: decides between first-run greeting, welcome-back
//! message, and silent resume.
//!
//! Runs exactly once, at startup, before any user interaction. Failures are
//! logged and swallowed — they must never block rendering of the existing
//! transcript.

use std::sync::Arc;

use chrono::{Duration, Utc};
use nova_core::types::Memory;
use tracing::{info, warn};

use crate::orchestrator::Inner;

/// Fixed greeting injected on the very first run (no Language Service call).
pub const FIRST_RUN_GREETING: &str = "Hi! I'm Nova. I have a long-term memory, \
so if you tell me things about yourself (like allergies, hobbies, or plans), \
I'll remember them for next time. What's on your mind?";

/// What bootstrap decided to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// Empty transcript: the fixed greeting was injected.
    FirstRun,
    /// The gap since the last message exceeded the threshold: a generated
    /// welcome-back message was appended.
    WelcomeBack,
    /// Recent activity, or welcome generation failed: the existing
    /// transcript is shown as-is.
    Resumed,
}

enum Decision {
    First,
    Welcome {
        memories: Vec<Memory>,
        last_message_at: chrono::DateTime<Utc>,
    },
    Recent,
}

pub(crate) async fn run(engine: &Arc<Inner>) -> BootstrapOutcome {
    let decision = {
        let state = engine.state();
        match state.last_message() {
            None => Decision::First,
            Some(last) => {
                let elapsed = Utc::now() - last.timestamp;
                if elapsed > Duration::hours(engine.welcome_threshold_hours) {
                    Decision::Welcome {
                        memories: state.memories().to_vec(),
                        last_message_at: last.timestamp,
                    }
                } else {
                    Decision::Recent
                }
            }
        }
    };

    match decision {
        Decision::First => {
            engine.append_model_message(FIRST_RUN_GREETING);
            info!("First run: greeting injected");
            BootstrapOutcome::FirstRun
        }
        Decision::Welcome {
            memories,
            last_message_at,
        } => {
            match engine
                .language
                .generate_welcome_message(&memories, last_message_at)
                .await
            {
                Ok(text) => {
                    let message = engine.append_model_message(text);
                    engine.speak_unless_muted(&message.text);
                    info!("Welcome-back message appended");
                    BootstrapOutcome::WelcomeBack
                }
                Err(e) => {
                    warn!(error = %e, "Welcome message failed");
                    // Swallowed: the existing transcript stays available.
                    engine.reschedule();
                    BootstrapOutcome::Resumed
                }
            }
        }
        Decision::Recent => {
            // No-op beyond starting the idle watch.
            engine.reschedule();
            BootstrapOutcome::Resumed
        }
    }
}
