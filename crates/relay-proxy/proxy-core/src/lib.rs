//! Wire records and pure helpers shared by the relay proxy and its relay client.

mod beacon;
mod build_id;
mod payload;
pub mod transactions_root;

pub use alloy_rpc_types_engine::{
    ForkchoiceState,
    ForkchoiceUpdated,
    PayloadAttributes,
    PayloadId,
    PayloadStatus,
    PayloadStatusEnum,
};
pub use beacon::{
    BlindedBeaconBlock,
    CommittedHeader,
    EXECUTION_PAYLOAD_HEADER_KEYS,
    SignedBlindedBeaconBlock,
};
pub use build_id::{
    ForkchoiceAttributes,
    derive_build_id,
    parse_build_id,
};
pub use payload::{
    CommitmentKey,
    ExecutionPayloadWithTxRoot,
};
pub use transactions_root::{
    TransactionsRootError,
    transactions_root,
};

/// Inbound engine method answered locally from the forkchoice state.
pub const ENGINE_FORKCHOICE_UPDATED_V1: &str = "engine_forkchoiceUpdatedV1";
/// Inbound method returning a blinded payload header.
pub const BUILDER_GET_PAYLOAD_HEADER_V1: &str = "builder_getPayloadHeaderV1";
/// Inbound method revealing the full payload for a signed blinded block.
pub const BUILDER_PROPOSE_BLINDED_BLOCK_V1: &str = "builder_proposeBlindedBlockV1";
/// Relay-side name of [`BUILDER_GET_PAYLOAD_HEADER_V1`].
pub const RELAY_GET_PAYLOAD_HEADER_V1: &str = "relay_getPayloadHeaderV1";
/// Relay-side name of [`BUILDER_PROPOSE_BLINDED_BLOCK_V1`].
pub const RELAY_PROPOSE_BLINDED_BLOCK_V1: &str = "relay_proposeBlindedBlockV1";
