/*
 * REST API module for the swap routing service
 */

use ethers::types::U256;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{get, post, routes, State};
use serde::Deserialize;
use std::sync::Arc;

use crate::models::{
    CrossChainRoute, CrossChainTransaction, HermesError, RouteCandidate, RouteType,
};
use crate::SwapService;

pub struct ApiState {
    pub swap_service: Arc<SwapService>,
}

fn bad_request(message: String) -> Custom<String> {
    Custom(Status::BadRequest, message)
}

fn parse_amount(raw: &str) -> std::result::Result<U256, Custom<String>> {
    U256::from_dec_str(raw).map_err(|e| bad_request(format!("Invalid amount: {e}")))
}

#[get("/api/v1/quote?<chain_id>&<token_in>&<token_out>&<amount_in>&<slippage>")]
pub async fn get_quote(
    chain_id: u64,
    token_in: String,
    token_out: String,
    amount_in: String,
    slippage: Option<f64>,
    state: &State<ApiState>,
) -> std::result::Result<Json<RouteCandidate>, Custom<String>> {
    let amount = parse_amount(&amount_in)?;
    let slippage_tolerance = slippage.unwrap_or(0.005);

    let route = state
        .swap_service
        .find_best_route(chain_id, &token_in, &token_out, amount, slippage_tolerance)
        .await
        .map_err(|e| match e {
            HermesError::NoRouteFound | HermesError::NotFound(_) => {
                Custom(Status::NotFound, e.to_string())
            }
            _ => Custom(Status::InternalServerError, e.to_string()),
        })?;

    Ok(Json(route))
}

#[get(
    "/api/v1/crosschain/routes?<source_chain_id>&<target_chain_id>&<source_token>&<target_token>&<amount_in>&<route_type>"
)]
pub async fn search_cross_chain_routes(
    source_chain_id: u64,
    target_chain_id: u64,
    source_token: String,
    target_token: String,
    amount_in: String,
    route_type: Option<String>,
    state: &State<ApiState>,
) -> std::result::Result<Json<Vec<CrossChainRoute>>, Custom<String>> {
    let amount = parse_amount(&amount_in)?;
    let route_type = match route_type.as_deref() {
        None | Some("BALANCED") => RouteType::Balanced,
        Some("FASTEST") => RouteType::Fastest,
        Some("CHEAPEST") => RouteType::Cheapest,
        Some(other) => return Err(bad_request(format!("Invalid route type: {other}"))),
    };

    let routes = state.swap_service.search_cross_chain_routes(
        source_chain_id,
        target_chain_id,
        &source_token,
        &target_token,
        amount,
        route_type,
    );

    Ok(Json(routes))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteSwapRequest {
    pub route: CrossChainRoute,
    pub user_address: String,
    pub slippage_percent: Option<f64>,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteSwapResponse {
    pub transaction_id: String,
}

#[post("/api/v1/crosschain/execute", data = "<request>")]
pub async fn execute_cross_chain_swap(
    request: Json<ExecuteSwapRequest>,
    state: &State<ApiState>,
) -> std::result::Result<Json<ExecuteSwapResponse>, Custom<String>> {
    let request = request.into_inner();
    let transaction_id = state
        .swap_service
        .execute_cross_chain_swap(request.route, &request.user_address, request.slippage_percent)
        .await
        .map_err(|e| match e {
            HermesError::CircuitBreakerOpen
            | HermesError::DailyLimitExceeded(_)
            | HermesError::InvalidRoute(_) => Custom(Status::UnprocessableEntity, e.to_string()),
            _ => Custom(Status::InternalServerError, e.to_string()),
        })?;

    Ok(Json(ExecuteSwapResponse { transaction_id }))
}

#[get("/api/v1/crosschain/transactions/<transaction_id>")]
pub async fn get_transaction(
    transaction_id: String,
    state: &State<ApiState>,
) -> std::result::Result<Json<CrossChainTransaction>, Custom<String>> {
    state
        .swap_service
        .get_transaction(&transaction_id)
        .await
        .map(Json)
        .ok_or_else(|| {
            Custom(
                Status::NotFound,
                format!("Transaction not found: {transaction_id}"),
            )
        })
}

#[get("/api/v1/crosschain/transactions?<user_address>")]
pub async fn get_user_transactions(
    user_address: String,
    state: &State<ApiState>,
) -> Json<Vec<CrossChainTransaction>> {
    Json(state.swap_service.get_user_transactions(&user_address).await)
}

#[post("/api/v1/crosschain/transactions/<transaction_id>/retry")]
pub async fn retry_transaction(
    transaction_id: String,
    state: &State<ApiState>,
) -> std::result::Result<Json<CrossChainTransaction>, Custom<String>> {
    state
        .swap_service
        .retry_transaction(&transaction_id)
        .await
        .map(Json)
        .map_err(|e| match e {
            HermesError::NotFound(_) => Custom(Status::NotFound, e.to_string()),
            HermesError::NotRetryable(_) => Custom(Status::UnprocessableEntity, e.to_string()),
            _ => Custom(Status::InternalServerError, e.to_string()),
        })
}

#[get("/api/v1/crosschain/availability?<source_chain_id>&<target_chain_id>")]
pub async fn route_availability(
    source_chain_id: u64,
    target_chain_id: u64,
    state: &State<ApiState>,
) -> Json<bool> {
    Json(
        state
            .swap_service
            .is_route_available(source_chain_id, target_chain_id),
    )
}

#[get("/metrics")]
pub async fn metrics() -> String {
    crate::metrics::gather()
}

#[get("/health")]
pub async fn health_check() -> &'static str {
    "OK"
}

#[must_use]
pub fn create_rocket(state: ApiState) -> rocket::Rocket<rocket::Build> {
    rocket::build().manage(state).mount(
        "/",
        routes![
            get_quote,
            search_cross_chain_routes,
            execute_cross_chain_swap,
            get_transaction,
            get_user_transactions,
            retry_transaction,
            route_availability,
            metrics,
            health_check,
        ],
    )
}
