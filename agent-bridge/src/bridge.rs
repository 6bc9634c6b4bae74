//! Bridge RPC tool surface (§6).

use agent_core::error::BridgeError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type BridgeResult<T> = Result<T, BridgeError>;

/// The three invocation shapes `mine_block` accepts (§6).
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MineBlockRequest {
    ByArea {
        name: String,
        count: u32,
        dig_only: bool,
        enable_xray: bool,
    },
    ByPosition {
        x: f64,
        y: f64,
        z: f64,
        dig_only: bool,
        enable_xray: bool,
    },
    ByDirection {
        direction_timeout_s: f64,
        dig_only: bool,
        enable_xray: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeItem {
    pub id: i64,
    pub name: String,
    pub metadata: i64,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecipe {
    pub result: RecipeItem,
    pub requires_table: bool,
    #[serde(default)]
    pub in_shape: Option<Vec<Vec<Option<RecipeItem>>>>,
    #[serde(default)]
    pub ingredients: Option<Vec<RecipeItem>>,
}

/// The set of named tools the core consumes from the bridge. Each call
/// returns `{ok, data|error_message, error_code?, request_id?}` on the
/// wire; implementations translate the failure branch into a
/// [`BridgeError`].
#[async_trait]
pub trait BridgeClient: Send + Sync {
    async fn query_area_blocks(
        &self,
        start: (i64, i64, i64),
        end: (i64, i64, i64),
        use_relative_coords: bool,
        max_blocks: u32,
    ) -> BridgeResult<Value>;

    async fn mine_block(&self, request: MineBlockRequest) -> BridgeResult<Value>;

    async fn kill_mob(&self, mob: &str) -> BridgeResult<Value>;

    async fn chat(&self, message: &str) -> BridgeResult<()>;

    async fn query_raw_recipe(&self, item: &str, use_crafting_table: bool) -> BridgeResult<Vec<RawRecipe>>;

    async fn craft_with_recipe(
        &self,
        recipe: &RawRecipe,
        count: u32,
        without_crafting_table: bool,
    ) -> BridgeResult<Value>;
}

/// Talks to the external bridge process's RPC endpoint over HTTP, one tool
/// per request path. Mirrors `ReqwestLlmClient`'s shape: only the trait's
/// method signatures are load-bearing, this transport exists so the rest
/// of the workspace has something real to construct.
pub struct HttpBridgeClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBridgeClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn call(&self, tool: &str, args: Value) -> BridgeResult<Value> {
        let response = self
            .http
            .post(format!("{}/{tool}", self.base_url))
            .json(&args)
            .send()
            .await
            .map_err(|e| BridgeError {
                reason: format!("request to {tool} failed: {e}"),
                error_code: None,
                request_id: None,
            })?;

        let envelope: Value = response.json().await.map_err(|e| BridgeError {
            reason: format!("{tool} response was not JSON: {e}"),
            error_code: None,
            request_id: None,
        })?;

        if envelope.get("ok").and_then(Value::as_bool) == Some(true) {
            Ok(envelope.get("data").cloned().unwrap_or(Value::Null))
        } else {
            Err(BridgeError {
                reason: envelope
                    .get("error_message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown bridge error")
                    .to_string(),
                error_code: envelope.get("error_code").and_then(Value::as_str).map(str::to_string),
                request_id: envelope.get("request_id").and_then(Value::as_str).map(str::to_string),
            })
        }
    }
}

#[async_trait]
impl BridgeClient for HttpBridgeClient {
    async fn query_area_blocks(
        &self,
        start: (i64, i64, i64),
        end: (i64, i64, i64),
        use_relative_coords: bool,
        max_blocks: u32,
    ) -> BridgeResult<Value> {
        self.call(
            "query_area_blocks",
            serde_json::json!({
                "startX": start.0, "startY": start.1, "startZ": start.2,
                "endX": end.0, "endY": end.1, "endZ": end.2,
                "useRelativeCoords": use_relative_coords,
                "maxBlocks": max_blocks,
                "compressionMode": true,
                "includeBlockCounts": false,
            }),
        )
        .await
    }

    async fn mine_block(&self, request: MineBlockRequest) -> BridgeResult<Value> {
        let args = serde_json::to_value(&request).map_err(|e| BridgeError {
            reason: format!("failed to encode mine_block request: {e}"),
            error_code: None,
            request_id: None,
        })?;
        self.call("mine_block", args).await
    }

    async fn kill_mob(&self, mob: &str) -> BridgeResult<Value> {
        self.call("kill_mob", serde_json::json!({ "mob": mob })).await
    }

    async fn chat(&self, message: &str) -> BridgeResult<()> {
        self.call("chat", serde_json::json!({ "message": message })).await.map(|_| ())
    }

    async fn query_raw_recipe(&self, item: &str, use_crafting_table: bool) -> BridgeResult<Vec<RawRecipe>> {
        let data = self
            .call(
                "query_raw_recipe",
                serde_json::json!({ "item": item, "useCraftingTable": use_crafting_table }),
            )
            .await?;
        serde_json::from_value(data).map_err(|e| BridgeError {
            reason: format!("malformed query_raw_recipe response: {e}"),
            error_code: None,
            request_id: None,
        })
    }

    async fn craft_with_recipe(&self, recipe: &RawRecipe, count: u32, without_crafting_table: bool) -> BridgeResult<Value> {
        self.call(
            "craft_with_recipe",
            serde_json::json!({
                "recipe": recipe,
                "count": count,
                "withoutCraftingTable": without_crafting_table,
            }),
        )
        .await
    }
}
