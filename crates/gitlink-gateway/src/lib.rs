//! HTTP gateway for the gitlink sign-in correlation flow.

pub mod signin_gateway;

pub use signin_gateway::*;
