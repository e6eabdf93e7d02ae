use cosmwasm_std::{to_json_binary, Addr, Binary, Coin};
use serde::Serialize;

use super::single_response;
use crate::chain::Chain;
use crate::errors::{HarnessError, HarnessResult};
use crate::ledger::Ledger;
use crate::msg::{MsgResponse, WasmMsg};

/// Stores `wasm` and commits the block. Returns the code id.
pub fn store_code<L: Ledger>(chain: &mut Chain<L>, sender: &Addr, wasm: &[u8]) -> HarnessResult<u64> {
    let msg = WasmMsg::StoreCode {
        wasm_byte_code: Binary::from(wasm),
    };
    let response = chain.submit_messages(sender, vec![msg.into()])?;
    match single_response(response.msg_responses, "StoreCode")? {
        MsgResponse::StoreCode { code_id, .. } => {
            chain.commit_block()?;
            Ok(code_id)
        }
        other => Err(HarnessError::inconsistency(format!(
            "StoreCode answered with {:?}",
            other
        ))),
    }
}

/// Instantiates a stored code and commits the block. Returns the address of
/// the new contract.
pub fn instantiate<L, M>(
    chain: &mut Chain<L>,
    sender: &Addr,
    code_id: u64,
    init_msg: &M,
    funds: Vec<Coin>,
    label: &str,
) -> HarnessResult<Addr>
where
    L: Ledger,
    M: Serialize + ?Sized,
{
    let msg = to_json_binary(init_msg)
        .map_err(|e| HarnessError::serialize_err(std::any::type_name::<M>(), e))?;
    let msg = WasmMsg::Instantiate {
        admin: None,
        code_id,
        msg,
        funds,
        label: label.to_string(),
    };
    let response = chain.submit_messages(sender, vec![msg.into()])?;
    match single_response(response.msg_responses, "Instantiate")? {
        MsgResponse::Instantiate { address, .. } => {
            chain.commit_block()?;
            log::debug!("{} instantiated code {} at {}", chain.id(), code_id, address);
            Ok(address)
        }
        other => Err(HarnessError::inconsistency(format!(
            "Instantiate answered with {:?}",
            other
        ))),
    }
}
