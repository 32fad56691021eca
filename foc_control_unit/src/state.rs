//! Controller state machine.
//!
//! The single authority for `State`. Every mutation of the public state goes
//! through [`machine::ControllerStateMachine::handle_event`].

pub mod machine;
