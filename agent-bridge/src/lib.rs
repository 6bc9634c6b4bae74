//! Out-of-scope collaborators' interfaces (§6): the bridge RPC transport
//! and the LLM/VLM text clients. Only the shapes are fixed by §6; the
//! concrete reqwest-based implementations here exist so the rest of the
//! workspace has something real to construct and test against, not because
//! their internals are load-bearing.

pub mod bridge;
pub mod llm;

pub use bridge::{BridgeClient, BridgeResult, HttpBridgeClient, MineBlockRequest, RawRecipe, RecipeItem};
pub use llm::{LlmClient, ReqwestLlmClient};
