//! FairPlay setup handshake (`POST /fp-setup`).
//!
//! The sender opens with a short binary message whose seventh byte names
//! the handshake stage:
//!
//! ```text
//! offset  0  1  2  3  4  5  6
//!         F  P  L  Y  02 01 <stage>
//! ```
//!
//! Each known stage answers with a fixed reply produced by the key
//! material provider. The engine never looks inside those replies. An
//! unknown stage is logged and answered with an empty 200, which senders
//! treat as "no certificate data for this stage".

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{RaopError, Result};
use crate::protocol::handler::CapabilityHandler;
use crate::protocol::request::RaopRequest;
use crate::protocol::response::RaopResponse;

/// Byte offset of the stage discriminant within the setup body.
pub const STAGE_OFFSET: usize = 6;

/// Reply to stage 1 of the setup handshake.
pub const STAGE_ONE_REPLY: [u8; 142] = [
    0x46, 0x50, 0x4c, 0x59, 0x02, 0x01, 0x02, 0x00, 0x00, 0x00, 0x00, 0x82, //
    0x02, 0x02, 0x2f, 0x7b, 0x69, 0xe6, 0xb2, 0x7e, 0xbb, 0xf0, 0x68, 0x5f, 0x98, 0x54, 0x7f, 0x37,
    0xce, 0xcf, 0x87, 0x06, 0x99, 0x6e, 0x7e, 0x6b, 0x0f, 0xb2, 0xfa, 0x71, 0x20, 0x53, 0xe3, 0x94,
    0x83, 0xda, 0x22, 0xc7, 0x83, 0xa0, 0x72, 0x40, 0x4d, 0xdd, 0x41, 0xaa, 0x3d, 0x4c, 0x6e, 0x30,
    0x22, 0x55, 0xaa, 0xa2, 0xda, 0x1e, 0xb4, 0x77, 0x83, 0x8c, 0x79, 0xd5, 0x65, 0x17, 0xc3, 0xfa,
    0x01, 0x54, 0x33, 0x9e, 0xe3, 0x82, 0x9f, 0x30, 0xf0, 0xa4, 0x8f, 0x76, 0xdf, 0x77, 0x11, 0x7e,
    0x56, 0x9e, 0xf3, 0x95, 0xe8, 0xe2, 0x13, 0xb3, 0x1e, 0xb6, 0x70, 0xec, 0x5a, 0x8a, 0xf2, 0x6a,
    0xfc, 0xbc, 0x89, 0x31, 0xe6, 0x7e, 0xe8, 0xb9, 0xc5, 0xf2, 0xc7, 0x1d, 0x78, 0xf3, 0xef, 0x8d,
    0x61, 0xf7, 0x3b, 0xcc, 0x17, 0xc3, 0x40, 0x23, 0x52, 0x4a, 0x8b, 0x9c, 0xb1, 0x75, 0x05, 0x66,
    0xe6, 0xb3,
];

/// Result of looking up a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// Known stage: send this reply verbatim.
    Reply(Arc<[u8]>),
    /// No reply is registered for this stage value.
    Unknown(u8),
}

/// Stateless FairPlay setup engine.
///
/// Stages are registered once at construction and only read afterwards,
/// so one instance is shared by every connection thread.
#[derive(Debug, Clone)]
pub struct FairPlaySetup {
    stages: BTreeMap<u8, Arc<[u8]>>,
}

impl Default for FairPlaySetup {
    /// Engine answering stage 1 with [`STAGE_ONE_REPLY`].
    fn default() -> Self {
        Self::new().with_stage(1, STAGE_ONE_REPLY.as_slice())
    }
}

impl FairPlaySetup {
    /// Engine with no stages registered.
    pub fn new() -> Self {
        Self {
            stages: BTreeMap::new(),
        }
    }

    /// Register (or replace) the reply for a stage.
    pub fn with_stage(mut self, stage: u8, reply: impl Into<Arc<[u8]>>) -> Self {
        self.stages.insert(stage, reply.into());
        self
    }

    /// Registered stage values, ascending.
    pub fn stages(&self) -> impl Iterator<Item = u8> + '_ {
        self.stages.keys().copied()
    }

    /// Read the stage byte from a setup body.
    pub fn stage_of(body: &[u8]) -> Result<u8> {
        body.get(STAGE_OFFSET)
            .copied()
            .ok_or(RaopError::MalformedHandshakeBody {
                len: body.len(),
                offset: STAGE_OFFSET,
            })
    }

    /// Identify the stage of `body` and look up its reply.
    ///
    /// Only the stage byte is inspected; the rest of the body does not
    /// affect the outcome.
    pub fn process(&self, body: &[u8]) -> Result<StageOutcome> {
        let stage = Self::stage_of(body)?;
        Ok(match self.stages.get(&stage) {
            Some(reply) => StageOutcome::Reply(Arc::clone(reply)),
            None => StageOutcome::Unknown(stage),
        })
    }
}

impl CapabilityHandler for FairPlaySetup {
    fn handle(&self, request: &RaopRequest) -> Result<RaopResponse> {
        match self.process(&request.body)? {
            StageOutcome::Reply(reply) => {
                tracing::debug!(len = reply.len(), "fp-setup reply");
                Ok(RaopResponse::ok().with_body(reply.to_vec()))
            }
            StageOutcome::Unknown(stage) => {
                tracing::info!(stage, "unhandled fp-setup stage");
                Ok(RaopResponse::ok())
            }
        }
    }
}
