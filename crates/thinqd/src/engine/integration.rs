//! The seam between the engine and a device ecosystem.
//!
//! An integration runs in its own task. `setup` runs once and announces
//! devices and entities; state changes are pushed on the event sender from
//! then on, typically by polling tasks spawned during setup. Commands for the
//! integration's entities arrive one at a time through `handle_command`.
//! `shutdown` runs when the engine drops the command channel.

use std::error::Error;

use async_trait::async_trait;
use linkme::distributed_slice;
use tokio::sync::mpsc;

use super::message::FromIntegrationMessage;
use super::message::ToIntegrationMessage;
use crate::config::Config;

/// Events towards the engine. Bounded, so a flooding integration waits.
pub type FromIntegrationSender = mpsc::Sender<FromIntegrationMessage>;
pub type FromIntegrationReceiver = mpsc::Receiver<FromIntegrationMessage>;

/// Commands towards an integration. Unbounded, so routing never blocks the
/// engine.
pub type ToIntegrationSender = mpsc::UnboundedSender<ToIntegrationMessage>;

/// A failure of the integration itself, as opposed to a rejected command.
pub type IntegrationError = Box<dyn Error + Send>;

/// `Ok(None)` when the integration is not configured.
pub type IntegrationFactoryResult = anyhow::Result<Option<Box<dyn Integration>>>;

pub type IntegrationFactory = fn(&IntegrationContext) -> IntegrationFactoryResult;

/// What a factory may look at while building its integration.
pub struct IntegrationContext<'a> {
    pub config: &'a Config,
}

/// Factories linked into the binary. Each integration module adds one with
/// `#[distributed_slice(INTEGRATION_REGISTRY)]`.
#[distributed_slice]
pub static REGISTRY: [IntegrationFactory];

#[async_trait]
pub trait Integration: Send + Sync {
    /// Prefix used in logs and for routing.
    fn name(&self) -> &str;

    /// Announce devices and entities on `events` and start reporting state.
    ///
    /// An error here stops the integration; no commands are delivered to it.
    async fn setup(&mut self, events: FromIntegrationSender) -> Result<(), IntegrationError>;

    /// Execute one command.
    ///
    /// Every command carries a reply channel and the caller awaits it, so the
    /// integration must answer exactly once, with `Ok(())` or the
    /// `CommandError` describing the rejection, before returning. A dropped
    /// reply surfaces as `CommandError::ChannelClosed`. Return `Err` only when
    /// the integration itself is broken; the engine logs it and keeps
    /// delivering commands.
    async fn handle_command(&mut self, command: ToIntegrationMessage) -> Result<(), IntegrationError>;

    /// Stop background work. Nothing to do by default.
    async fn shutdown(&mut self) -> Result<(), IntegrationError> {
        Ok(())
    }
}
