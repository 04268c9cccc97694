use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, Read, ReadExt, Write};
use thiserror::Error as ThisError;

use crate::PPM;

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum LedgerError {
    #[error("reservation {requested} exceeds headroom {headroom}")]
    ReservationExceedsHeadroom { requested: u64, headroom: u64 },
    #[error("payout {requested} exceeds balance {balance}")]
    PayoutExceedsBalance { requested: u64, balance: u64 },
    #[error("withdrawal {requested} exceeds free balance {free}")]
    WithdrawalExceedsFree { requested: u64, free: u64 },
    #[error("reserved {reserved} exceeds balance {balance}")]
    ReservedExceedsBalance { reserved: u64, balance: u64 },
    #[error("ledger counter overflow")]
    Overflow,
}

/// House-side ledger: liquid balance, funds earmarked against worst-case
/// payouts of live sessions, and lifetime totals.
///
/// All mutations are additive or subtractive; no operation assigns an
/// absolute balance computed elsewhere. `reserved` must always equal the sum
/// of `max_payout` over ACTIVE sessions, which the engine maintains by
/// pairing every reservation with exactly one release at termination.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct HouseState {
    pub balance: u64,
    pub reserved: u64,
    pub total_received: u64,
    pub total_paid_out: u64,
    /// Admin kill-switch. A locked house accepts no new sessions.
    pub locked: bool,
}

impl HouseState {
    /// Portion of the balance held back from all reservations.
    pub fn safety_margin(&self, margin_ppm: u32) -> u64 {
        ((self.balance as u128 * margin_ppm as u128) / PPM as u128) as u64
    }

    /// Liquidity available for new reservations.
    pub fn headroom(&self, margin_ppm: u32) -> u64 {
        self.balance
            .saturating_sub(self.reserved)
            .saturating_sub(self.safety_margin(margin_ppm))
    }

    pub fn can_reserve(&self, amount: u64, margin_ppm: u32) -> bool {
        self.headroom(margin_ppm) >= amount
    }

    /// Earmark `amount` against a session's worst-case payout. Fails without
    /// mutation if headroom is insufficient.
    pub fn reserve(&mut self, amount: u64, margin_ppm: u32) -> Result<(), LedgerError> {
        if !self.can_reserve(amount, margin_ppm) {
            return Err(LedgerError::ReservationExceedsHeadroom {
                requested: amount,
                headroom: self.headroom(margin_ppm),
            });
        }
        self.reserved = self
            .reserved
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    /// Release an earmark. Saturates at zero so a redundant release of an
    /// already-terminated session never underflows.
    pub fn release(&mut self, amount: u64) {
        self.reserved = self.reserved.saturating_sub(amount);
    }

    pub fn receive_bet(&mut self, amount: u64) -> Result<(), LedgerError> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        self.total_received = self
            .total_received
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    pub fn payout(&mut self, amount: u64) -> Result<(), LedgerError> {
        self.balance = self
            .balance
            .checked_sub(amount)
            .ok_or(LedgerError::PayoutExceedsBalance {
                requested: amount,
                balance: self.balance,
            })?;
        self.total_paid_out = self
            .total_paid_out
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    /// External funding of the house (not part of the wager flow, so not
    /// counted in `total_received`).
    pub fn fund(&mut self, amount: u64) -> Result<(), LedgerError> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    /// Admin withdrawal, capped at the unreserved balance.
    pub fn withdraw(&mut self, amount: u64) -> Result<(), LedgerError> {
        let free = self.balance.saturating_sub(self.reserved);
        if amount > free {
            return Err(LedgerError::WithdrawalExceedsFree {
                requested: amount,
                free,
            });
        }
        self.balance = self
            .balance
            .checked_sub(amount)
            .ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    pub fn validate_invariants(&self) -> Result<(), LedgerError> {
        if self.reserved > self.balance {
            return Err(LedgerError::ReservedExceedsBalance {
                reserved: self.reserved,
                balance: self.balance,
            });
        }
        Ok(())
    }
}

impl Write for HouseState {
    fn write(&self, writer: &mut impl BufMut) {
        self.balance.write(writer);
        self.reserved.write(writer);
        self.total_received.write(writer);
        self.total_paid_out.write(writer);
        self.locked.write(writer);
    }
}

impl Read for HouseState {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            balance: u64::read(reader)?,
            reserved: u64::read(reader)?,
            total_received: u64::read(reader)?,
            total_paid_out: u64::read(reader)?,
            locked: bool::read(reader)?,
        })
    }
}

impl EncodeSize for HouseState {
    fn encode_size(&self) -> usize {
        self.balance.encode_size()
            + self.reserved.encode_size()
            + self.total_received.encode_size()
            + self.total_paid_out.encode_size()
            + self.locked.encode_size()
    }
}
