//! Pure state machine for pipeline control flow
//!
//! No I/O and no async. The pipeline feeds events in and executes the
//! returned actions; every decision about what runs next lives here.
//!
//! - Pure function: transition(state, event) -> (state, actions)
//! - Stages advance strictly in [`StageKind::ALL`] order
//! - Persistence is entered from both success and failure
//! - Invalid transitions go to Aborted (never panic)

use crate::stage::StageKind;

/// Pipeline state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    /// Nothing has run yet
    NotStarted,
    /// A stage is executing
    Running { stage: StageKind },
    /// Saving the session; `failure` is set when the run is aborting
    Persisting {
        failure: Option<(StageKind, String)>,
    },
    /// Every stage finished
    Completed,
    /// Stopped early. `stage` is unset when the run never reached one.
    Aborted {
        stage: Option<StageKind>,
        reason: String,
    },
}

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start,
    /// The running stage produced an artifact that passed validation
    StageSucceeded,
    /// The running stage failed and its policy does not allow continuing
    StageFailed { reason: String },
    Persisted,
    PersistFailed { reason: String },
}

/// Side effects requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    RunStage { stage: StageKind },
    Persist,
    LogActivity { message: String },
}

impl State {
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Completed | State::Aborted { .. })
    }

    /// Stage a terminal or running state refers to, if any
    pub fn stage(&self) -> Option<StageKind> {
        match self {
            State::Running { stage } => Some(*stage),
            State::Persisting { failure } => failure.as_ref().map(|(stage, _)| *stage),
            State::Aborted { stage, .. } => *stage,
            State::NotStarted | State::Completed => None,
        }
    }
}

/// Pure state transition function
///
/// Takes current state and event, returns new state and actions to execute.
/// Any invalid transition results in an Aborted state with a descriptive
/// reason.
pub fn transition(state: State, event: Event) -> (State, Vec<Action>) {
    match (state, event) {
        (State::NotStarted, Event::Start) => {
            let stage = StageKind::first();
            let actions = vec![
                Action::LogActivity {
                    message: "Pipeline started".to_string(),
                },
                Action::RunStage { stage },
            ];
            (State::Running { stage }, actions)
        }

        (State::Running { stage }, Event::StageSucceeded) => match stage.next() {
            Some(next) => (
                State::Running { stage: next },
                vec![
                    Action::LogActivity {
                        message: format!("Stage {} complete, starting {}", stage, next),
                    },
                    Action::RunStage { stage: next },
                ],
            ),
            None => (
                State::Persisting { failure: None },
                vec![
                    Action::LogActivity {
                        message: "All stages complete, saving session".to_string(),
                    },
                    Action::Persist,
                ],
            ),
        },

        (State::Running { stage }, Event::StageFailed { reason }) => {
            let actions = vec![
                Action::LogActivity {
                    message: format!("Stage {} failed: {}", stage, reason),
                },
                Action::Persist,
            ];
            (
                State::Persisting {
                    failure: Some((stage, reason)),
                },
                actions,
            )
        }

        (State::Persisting { failure }, Event::Persisted) => finish(failure, vec![]),

        (State::Persisting { failure }, Event::PersistFailed { reason }) => finish(
            failure,
            vec![Action::LogActivity {
                message: format!("Session could not be saved: {}", reason),
            }],
        ),

        // Terminal states - no valid transitions
        (State::Completed, event) => (
            State::Aborted {
                stage: None,
                reason: format!("Invalid transition from Completed on event: {:?}", event),
            },
            vec![],
        ),

        (State::Aborted { stage, reason }, event) => (
            State::Aborted {
                stage,
                reason: format!(
                    "Invalid transition from Aborted (reason: {}) on event: {:?}",
                    reason, event
                ),
            },
            vec![],
        ),

        // All other invalid transitions
        (state, event) => (
            State::Aborted {
                stage: state.stage(),
                reason: format!(
                    "Invalid state transition: {:?} cannot handle event {:?}",
                    state, event
                ),
            },
            vec![],
        ),
    }
}

fn finish(failure: Option<(StageKind, String)>, mut actions: Vec<Action>) -> (State, Vec<Action>) {
    match failure {
        None => {
            actions.push(Action::LogActivity {
                message: "Pipeline completed".to_string(),
            });
            (State::Completed, actions)
        }
        Some((stage, reason)) => {
            actions.push(Action::LogActivity {
                message: format!("Pipeline aborted at {}", stage),
            });
            (
                State::Aborted {
                    stage: Some(stage),
                    reason,
                },
                actions,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_stage(actions: &[Action]) -> Option<StageKind> {
        actions.iter().find_map(|a| match a {
            Action::RunStage { stage } => Some(*stage),
            _ => None,
        })
    }

    #[test]
    fn test_happy_path_full_flow() {
        let (mut state, actions) = transition(State::NotStarted, Event::Start);
        assert_eq!(state, State::Running { stage: StageKind::Plan });
        assert_eq!(run_stage(&actions), Some(StageKind::Plan));

        let mut visited = vec![StageKind::Plan];
        loop {
            let (next, actions) = transition(state, Event::StageSucceeded);
            state = next;
            match run_stage(&actions) {
                Some(stage) => visited.push(stage),
                None => {
                    assert!(actions.contains(&Action::Persist));
                    break;
                }
            }
        }
        assert_eq!(visited, StageKind::ALL.to_vec());
        assert_eq!(state, State::Persisting { failure: None });

        let (state, _) = transition(state, Event::Persisted);
        assert_eq!(state, State::Completed);
        assert!(state.is_terminal());
    }

    #[test]
    fn test_failure_from_any_running_state_persists_then_aborts() {
        for stage in StageKind::ALL {
            let (state, actions) = transition(
                State::Running { stage },
                Event::StageFailed {
                    reason: "boom".to_string(),
                },
            );
            assert_eq!(
                state,
                State::Persisting {
                    failure: Some((stage, "boom".to_string()))
                }
            );
            assert!(actions.contains(&Action::Persist));
            assert_eq!(run_stage(&actions), None);

            let (state, _) = transition(state, Event::Persisted);
            assert_eq!(
                state,
                State::Aborted {
                    stage: Some(stage),
                    reason: "boom".to_string()
                }
            );
        }
    }

    #[test]
    fn test_persist_failure_keeps_outcome() {
        let (state, actions) = transition(
            State::Persisting { failure: None },
            Event::PersistFailed {
                reason: "disk full".to_string(),
            },
        );
        assert_eq!(state, State::Completed);
        assert!(actions.iter().any(
            |a| matches!(a, Action::LogActivity { message } if message.contains("disk full"))
        ));

        let (state, _) = transition(
            State::Persisting {
                failure: Some((StageKind::Debug, "bad".to_string())),
            },
            Event::PersistFailed {
                reason: "disk full".to_string(),
            },
        );
        assert!(matches!(
            state,
            State::Aborted {
                stage: Some(StageKind::Debug),
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_transition_never_panics() {
        let (state, actions) = transition(State::NotStarted, Event::StageSucceeded);
        assert!(matches!(state, State::Aborted { stage: None, .. }));
        assert!(actions.is_empty());

        let (state, _) = transition(
            State::Running {
                stage: StageKind::WriteCode,
            },
            Event::Start,
        );
        assert!(matches!(
            state,
            State::Aborted {
                stage: Some(StageKind::WriteCode),
                ..
            }
        ));

        let (state, _) = transition(State::Persisting { failure: None }, Event::StageSucceeded);
        assert!(matches!(state, State::Aborted { .. }));
    }

    #[test]
    fn test_terminal_states_reject_all_events() {
        let (state, _) = transition(State::Completed, Event::Start);
        assert!(matches!(state, State::Aborted { .. }));

        let aborted = State::Aborted {
            stage: Some(StageKind::Plan),
            reason: "Original".to_string(),
        };
        let (state, actions) = transition(aborted, Event::Persisted);
        match state {
            State::Aborted { stage, reason } => {
                assert_eq!(stage, Some(StageKind::Plan));
                assert!(reason.contains("Original"));
            }
            other => panic!("unexpected state: {other:?}"),
        }
        assert!(actions.is_empty());
    }
}
