//! Blocking owner loop for `keyflow run`.

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info};

use crate::core::collab::Collaborators;
use crate::core::error::DispatchError;
use crate::core::link::Location;
use crate::core::session::Session;
use crate::core::types::{Outcome, Payload};
use crate::engine::Engine;

/// Reason why `run_session` stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStop {
    /// Back navigation found no prior location.
    Finished,
    /// The user or an action aborted.
    Aborted,
    /// The configured `max_steps` was reached.
    StepLimit { max_steps: u32 },
}

/// Summary of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub stop: RunStop,
    pub steps: u32,
}

/// One dispatched key, reported to the `on_step` callback.
#[derive(Debug)]
pub struct RunStep<'a> {
    pub location: &'a Location,
    pub key: &'a str,
    pub result: &'a Result<Outcome, DispatchError>,
}

/// Walk the session's current block key by key until it finishes.
///
/// Relocations restart at the new block; a finished block or a `Back`
/// result steps back along the breadcrumb trail. Failures and recoverable
/// errors are shown inline and the walk continues with the next key.
/// When `path` is `None` the session continues from where it was saved.
pub fn run_session<F: FnMut(&RunStep<'_>)>(
    engine: &Engine,
    session: &mut Session,
    path: Option<&str>,
    collab: &Collaborators<'_>,
    max_steps: u32,
    mut on_step: F,
) -> Result<RunOutcome> {
    if let Some(path) = path {
        engine
            .start(session, path, collab)
            .with_context(|| format!("start {path}"))?;
    }

    let mut steps = 0u32;
    'blocks: loop {
        let location = session
            .current_location()
            .ok_or_else(|| anyhow!("session has no current location"))?;
        let entries = engine
            .current_block(session, collab)
            .with_context(|| format!("open {location}"))?;
        debug!(at = %location, keys = entries.len(), "entering block");

        for (key, command) in &entries {
            if max_steps != 0 && steps >= max_steps {
                info!(steps, "step limit reached");
                return Ok(RunOutcome {
                    stop: RunStop::StepLimit { max_steps },
                    steps,
                });
            }
            steps += 1;

            let result = engine.dispatch(session, key, command, collab);
            on_step(&RunStep {
                location: &location,
                key,
                result: &result,
            });

            match result {
                Ok(Outcome::Empty) | Ok(Outcome::Pending { .. }) => {}
                Ok(Outcome::Done { value }) => collab.display.show(&Payload::from_value(value)),
                Ok(Outcome::Failed { error }) => {
                    collab.display.show(&Payload::Message(error.message));
                }
                Ok(Outcome::Relocated { .. }) => continue 'blocks,
                Ok(Outcome::Back) => {
                    if leave_block(engine, session) {
                        continue 'blocks;
                    }
                    return Ok(RunOutcome {
                        stop: RunStop::Finished,
                        steps,
                    });
                }
                Ok(Outcome::Abort) => {
                    info!(steps, "run aborted");
                    return Ok(RunOutcome {
                        stop: RunStop::Aborted,
                        steps,
                    });
                }
                Err(err) if err.is_recoverable() => {
                    collab.display.show(&Payload::Message(err.to_string()));
                }
                Err(err) => return Err(err).with_context(|| format!("dispatch '{key}'")),
            }
        }

        if !leave_block(engine, session) {
            return Ok(RunOutcome {
                stop: RunStop::Finished,
                steps,
            });
        }
    }
}

fn leave_block(engine: &Engine, session: &mut Session) -> bool {
    matches!(engine.go_back(session), Outcome::Relocated { .. })
}
