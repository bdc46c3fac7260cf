// src/api.rs
//! Thin JSON binding over a [`ChainNode`].
//!
//! Transport is not part of the protocol; every handler delegates to the
//! node and translates [`ChainError`] into a status code plus its stable
//! machine code. No state of its own.

use crate::address::Address;
use crate::chain::ChainId;
use crate::error::{ChainError, ErrorKind};
use crate::node::ChainNode;
use crate::transaction::Txid;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

#[derive(Clone)]
pub struct ApiState {
    pub node: Arc<ChainNode>,
}

#[derive(Serialize)]
struct ApiError {
    error: String,
    code: &'static str,
}

fn fail(e: ChainError) -> Response {
    let status = match e.kind() {
        ErrorKind::Decode | ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::State => StatusCode::CONFLICT,
        ErrorKind::Authorization => StatusCode::FORBIDDEN,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ApiError {
            error: e.to_string(),
            code: e.code(),
        }),
    )
        .into_response()
}

fn parse_txid(s: &str) -> Result<Txid, Response> {
    Txid::from_str(s).map_err(|_| fail(ChainError::DecodeHex))
}

async fn list_branches(State(state): State<ApiState>) -> impl IntoResponse {
    match state.node.list_branches() {
        Ok(branches) => (StatusCode::OK, Json(branches)).into_response(),
        Err(e) => fail(e),
    }
}

async fn get_branch(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let branch_id = match parse_txid(&id) {
        Ok(t) => t,
        Err(r) => return r,
    };
    match state.node.get_branch(&branch_id) {
        Ok(branch) => (StatusCode::OK, Json(branch)).into_response(),
        Err(e) => fail(e),
    }
}

async fn branch_height(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let branch_id = match parse_txid(&id) {
        Ok(t) => t,
        Err(r) => return r,
    };
    match state.node.branch_best_height(&branch_id) {
        Ok(tip) => (StatusCode::OK, Json(tip)).into_response(),
        Err(e) => fail(e),
    }
}

async fn transfer_detail(
    State(state): State<ApiState>,
    Path(txid): Path<String>,
) -> impl IntoResponse {
    let txid = match parse_txid(&txid) {
        Ok(t) => t,
        Err(r) => return r,
    };
    match state.node.describe_transfer(&txid) {
        Ok(transfer) => (StatusCode::OK, Json(transfer)).into_response(),
        Err(e) => fail(e),
    }
}

#[derive(Deserialize)]
pub struct PostTransfer {
    pub dest_chain: String,
    pub dest_address: String,
    pub amount: u64,
}

#[derive(Serialize)]
struct TxidReply {
    txid: String,
}

async fn post_transfer(
    State(state): State<ApiState>,
    Json(req): Json<PostTransfer>,
) -> impl IntoResponse {
    let dest_chain = match ChainId::from_str(&req.dest_chain) {
        Ok(c) => c,
        Err(_) => return fail(ChainError::InvalidTarget(req.dest_chain)),
    };
    let dest_address = match Address::from_str(&req.dest_address) {
        Ok(a) => a,
        Err(_) => return fail(ChainError::InvalidKeyId),
    };
    match state.node.initiate_transfer(dest_chain, dest_address, req.amount) {
        Ok(txid) => (
            StatusCode::OK,
            Json(TxidReply {
                txid: txid.to_string(),
            }),
        )
            .into_response(),
        Err(e) => fail(e),
    }
}

async fn post_rebroadcast(
    State(state): State<ApiState>,
    Path(txid): Path<String>,
) -> impl IntoResponse {
    let txid = match parse_txid(&txid) {
        Ok(t) => t,
        Err(r) => return r,
    };
    match state.node.rebroadcast_transfer(&txid) {
        Ok(step_two) => (
            StatusCode::OK,
            Json(TxidReply {
                txid: step_two.to_string(),
            }),
        )
            .into_response(),
        Err(e) => fail(e),
    }
}

#[derive(Deserialize)]
pub struct PostStepTwo {
    /// Raw hex of the step-1 as mined on the source chain.
    pub raw_step_one: String,
}

async fn post_step_two(
    State(state): State<ApiState>,
    Json(req): Json<PostStepTwo>,
) -> impl IntoResponse {
    match state.node.make_branch_transaction(&req.raw_step_one) {
        Ok(txid) => (
            StatusCode::OK,
            Json(TxidReply {
                txid: txid.to_string(),
            }),
        )
            .into_response(),
        Err(e) => fail(e),
    }
}

#[derive(Deserialize)]
pub struct PostMortgage {
    pub branch_id: String,
    pub amount: u64,
    pub payout: String,
}

async fn post_mortgage(
    State(state): State<ApiState>,
    Json(req): Json<PostMortgage>,
) -> impl IntoResponse {
    let branch_id = match parse_txid(&req.branch_id) {
        Ok(t) => t,
        Err(r) => return r,
    };
    let payout = match Address::from_str(&req.payout) {
        Ok(a) => a,
        Err(_) => return fail(ChainError::InvalidKeyId),
    };
    match state
        .node
        .mortgage_for_branch_mining(&branch_id, req.amount, payout)
    {
        Ok(txid) => (
            StatusCode::OK,
            Json(TxidReply {
                txid: txid.to_string(),
            }),
        )
            .into_response(),
        Err(e) => fail(e),
    }
}

pub fn router(node: Arc<ChainNode>) -> Router {
    let state = ApiState { node };
    Router::new()
        .route("/branches", get(list_branches))
        .route("/branches/:id", get(get_branch))
        .route("/branches/:id/height", get(branch_height))
        .route("/transfers", post(post_transfer))
        .route("/transfers/:txid", get(transfer_detail))
        .route("/transfers/:txid/rebroadcast", post(post_rebroadcast))
        .route("/step2", post(post_step_two))
        .route("/mortgages", post(post_mortgage))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_map_to_distinct_statuses() {
        let cases = [
            (ChainError::DecodeHex, StatusCode::BAD_REQUEST),
            (
                ChainError::BranchNotFound("x".into()),
                StatusCode::NOT_FOUND,
            ),
            (ChainError::AlreadyInMempool, StatusCode::CONFLICT),
            (ChainError::MortgageOffMain, StatusCode::FORBIDDEN),
        ];
        for (err, want) in cases {
            let resp = fail(err);
            assert_eq!(resp.status(), want);
        }
    }
}
