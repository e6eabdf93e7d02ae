use std::collections::BTreeMap;

use cosmwasm_std::{Addr, Coin, Uint128};

use crate::errors::{LedgerError, LedgerResult};

/// Balances per address and denom.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Bank {
    balances: BTreeMap<Addr, BTreeMap<String, Uint128>>,
}

impl Bank {
    pub fn balance(&self, address: &Addr, denom: &str) -> Uint128 {
        self.balances
            .get(address)
            .and_then(|coins| coins.get(denom))
            .copied()
            .unwrap_or_default()
    }

    pub fn all_balances(&self, address: &Addr) -> Vec<Coin> {
        self.balances
            .get(address)
            .map(|coins| {
                coins
                    .iter()
                    .filter(|(_, amount)| !amount.is_zero())
                    .map(|(denom, amount)| Coin::new(*amount, denom))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set_balance(&mut self, address: &Addr, coin: Coin) {
        self.balances
            .entry(address.clone())
            .or_default()
            .insert(coin.denom, coin.amount);
    }

    pub fn mint(&mut self, address: &Addr, amount: &[Coin]) -> LedgerResult<()> {
        for coin in amount {
            let balance = self
                .balances
                .entry(address.clone())
                .or_default()
                .entry(coin.denom.clone())
                .or_default();
            *balance = balance.checked_add(coin.amount)?;
        }
        Ok(())
    }

    pub fn burn(&mut self, address: &Addr, amount: &[Coin]) -> LedgerResult<()> {
        for coin in amount.iter().filter(|c| !c.amount.is_zero()) {
            let available = self.balance(address, &coin.denom);
            let remaining = available.checked_sub(coin.amount).map_err(|_| {
                LedgerError::insufficient_funds(
                    address.as_str(),
                    Coin::new(available, &coin.denom),
                    coin,
                )
            })?;
            self.balances
                .entry(address.clone())
                .or_default()
                .insert(coin.denom.clone(), remaining);
        }
        Ok(())
    }

    pub fn send(&mut self, from: &Addr, to: &Addr, amount: &[Coin]) -> LedgerResult<()> {
        self.burn(from, amount)?;
        self.mint(to, amount)
    }
}

/// Bonded voting power per delegator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Staking {
    bonded: BTreeMap<Addr, Uint128>,
}

impl Staking {
    pub fn bond(&mut self, delegator: &Addr, amount: Uint128) {
        *self.bonded.entry(delegator.clone()).or_default() += amount;
    }

    pub fn power(&self, delegator: &Addr) -> Uint128 {
        self.bonded.get(delegator).copied().unwrap_or_default()
    }

    pub fn total_power(&self) -> Uint128 {
        self.bonded.values().copied().sum()
    }
}
