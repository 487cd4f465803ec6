/*
 * EVM implementation of the chain reader using raw eth_call
 */

use async_trait::async_trait;
use ethers::{
    abi::{encode, Token},
    types::{Address, U256},
    utils::keccak256,
};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::chain::ChainReader;
use crate::models::{HermesError, Result};
use crate::rpc::RpcClient;
use crate::utils::format_address;

pub struct EvmChainReader {
    rpc: Arc<RpcClient>,
}

impl EvmChainReader {
    #[must_use]
    pub fn new(rpc: Arc<RpcClient>) -> Self {
        Self { rpc }
    }

    fn parse_address(value: &str) -> Result<Address> {
        Address::from_str(value)
            .map_err(|e| HermesError::ContractError(format!("Invalid address {value}: {e}")))
    }
}

#[async_trait]
impl ChainReader for EvmChainReader {
    async fn get_reserves(&self, pair_address: &str) -> Result<(U256, U256, u32)> {
        let pair = Self::parse_address(pair_address)?;

        let selector = &keccak256(b"getReserves()")[0..4];
        let result = self.rpc.call(pair, selector.to_vec()).await?;

        // getReserves returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast)
        if result.len() < 96 {
            return Err(HermesError::ContractError(
                "Invalid getReserves response".to_string(),
            ));
        }

        let reserve0 = U256::from_big_endian(&result[0..32]);
        let reserve1 = U256::from_big_endian(&result[32..64]);
        let timestamp = (u32::from(result[92]) << 24)
            | (u32::from(result[93]) << 16)
            | (u32::from(result[94]) << 8)
            | u32::from(result[95]);

        Ok((reserve0, reserve1, timestamp))
    }

    async fn get_pair_address(
        &self,
        factory: &str,
        token_a: &str,
        token_b: &str,
    ) -> Result<String> {
        let factory_addr = Self::parse_address(factory)?;
        let a = Self::parse_address(token_a)?;
        let b = Self::parse_address(token_b)?;

        let selector = &keccak256(b"getPair(address,address)")[0..4];
        let encoded_params = encode(&[Token::Address(a), Token::Address(b)]);

        let mut call_data = Vec::from(selector);
        call_data.extend_from_slice(&encoded_params);

        let result = self.rpc.call(factory_addr, call_data).await?;

        if result.len() < 32 {
            return Err(HermesError::ContractError(
                "Invalid getPair response".to_string(),
            ));
        }

        let pair = Address::from_slice(&result[12..32]);
        if pair == Address::zero() {
            return Err(HermesError::NotFound(format!(
                "No pair for {token_a}/{token_b}"
            )));
        }

        let pair = format!("{pair:#x}");
        debug!(
            "Resolved pair {} for {}/{}",
            pair,
            format_address(token_a)?,
            format_address(token_b)?
        );
        Ok(pair)
    }
}
