//! Control primitives shared by the tasks and the running loop.
//!
//! PI current/speed controllers, first-order low-pass filters, frame
//! transforms and the back-EMF estimator used during open-loop drive.

pub mod back_emf;
pub mod filters;
pub mod pi;
pub mod transforms;
