//! Balance and position state transitions.

use crate::access::{ensure_any_role, ensure_role, Role};
use crate::core::position::Position;
use crate::core::types::{Address, PoolId};
use crate::error::{Error, Result};
use crate::protocol::events::{
    BadDebtSettledEvent, CollateralAddedEvent, CollateralMovedEvent, PositionAdjustedEvent,
    PositionConfiscatedEvent, PositionMovedEvent, ProtocolEvent, StabilityFeeAccruedEvent,
    StablecoinMovedEvent, UnbackedStablecoinMintedEvent,
};
use crate::utils::math::{Rad, Ray, Wad};
use crate::utils::validation::{
    validate_address, validate_non_zero_rad, validate_non_zero_wad, validate_transfer,
};

use super::Ledger;

fn negate(delta: i128) -> Result<i128> {
    delta.checked_neg().ok_or_else(|| Error::CollateralAmountOverflow(delta.to_string()))
}

/// Value of a signed raw debt share delta at `rate`: `(magnitude, negative)`
fn signed_value(debt_share_delta: i128, rate: Ray) -> (Rad, bool) {
    let magnitude = Wad::from_raw(debt_share_delta.unsigned_abs()).mul_ray(rate);
    (magnitude, debt_share_delta < 0)
}

impl Ledger {
    fn free_collateral_after(&self, pool: &PoolId, owner: &Address, delta: i128) -> Result<Wad> {
        let current = self.collateral_token(pool, owner);
        current.checked_add_signed(delta).map_err(|err| match err {
            Error::Underflow { .. } => Error::InsufficientCollateral {
                required: Wad::from_raw(delta.unsigned_abs()).to_string(),
                available: current.to_string(),
            },
            other => other,
        })
    }

    fn stablecoin_after(&self, owner: &Address, magnitude: Rad, negative: bool) -> Result<Rad> {
        let current = self.stablecoin(owner);
        if negative && current < magnitude {
            return Err(Error::InsufficientStablecoin {
                required: magnitude.to_string(),
                available: current.to_string(),
            });
        }
        current.checked_apply(magnitude, negative)
    }

    fn position_after(position: &Position, collateral_delta: i128, debt_share_delta: i128) -> Result<Position> {
        if collateral_delta < 0 && position.locked_collateral.raw() < collateral_delta.unsigned_abs() {
            return Err(Error::InsufficientCollateral {
                required: Wad::from_raw(collateral_delta.unsigned_abs()).to_string(),
                available: position.locked_collateral.to_string(),
            });
        }
        position.adjusted(collateral_delta, debt_share_delta)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // BALANCES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Credit or debit free collateral (adapter role)
    pub fn add_collateral(&mut self, caller: &Address, pool: &PoolId, owner: &Address, amount: i128) -> Result<()> {
        ensure_role(self.access(), Role::Adapter, caller)?;
        self.ensure_not_paused()?;
        self.pool(pool)?;
        let balance = self.free_collateral_after(pool, owner, amount)?;

        self.state.set_collateral(*pool, *owner, balance);
        self.emit(ProtocolEvent::CollateralAdded(CollateralAddedEvent {
            pool: *pool,
            owner: *owner,
            amount,
        }));
        tracing::debug!(pool = %pool, owner = %owner.short(), amount, "collateral added");
        Ok(())
    }

    /// Move free collateral (owner or delegate of `src`)
    pub fn move_collateral(
        &mut self,
        caller: &Address,
        pool: &PoolId,
        src: &Address,
        dst: &Address,
        amount: Wad,
    ) -> Result<()> {
        self.ensure_not_paused()?;
        self.ensure_can_modify(src, caller)?;
        validate_non_zero_wad(amount)?;
        validate_transfer(src, dst)?;

        let available = self.collateral_token(pool, src);
        let src_balance = available.checked_sub(amount).map_err(|_| Error::InsufficientCollateral {
            required: amount.to_string(),
            available: available.to_string(),
        })?;
        let dst_balance = self.collateral_token(pool, dst).checked_add(amount)?;

        self.state.set_collateral(*pool, *src, src_balance);
        self.state.set_collateral(*pool, *dst, dst_balance);
        self.emit(ProtocolEvent::CollateralMoved(CollateralMovedEvent {
            pool: *pool,
            src: *src,
            dst: *dst,
            amount,
        }));
        tracing::debug!(pool = %pool, src = %src.short(), dst = %dst.short(), %amount, "collateral moved");
        Ok(())
    }

    /// Move stablecoin (owner or delegate of `src`)
    pub fn move_stablecoin(&mut self, caller: &Address, src: &Address, dst: &Address, value: Rad) -> Result<()> {
        self.ensure_not_paused()?;
        self.ensure_can_modify(src, caller)?;
        validate_non_zero_rad(value)?;
        validate_transfer(src, dst)?;

        let src_balance = self.stablecoin_after(src, value, true)?;
        let dst_balance = self.stablecoin(dst).checked_add(value)?;

        self.state.set_stablecoin(*src, src_balance);
        self.state.set_stablecoin(*dst, dst_balance);
        self.emit(ProtocolEvent::StablecoinMoved(StablecoinMovedEvent {
            src: *src,
            dst: *dst,
            value,
        }));
        tracing::debug!(src = %src.short(), dst = %dst.short(), %value, "stablecoin moved");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // POSITIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Lock/free collateral and draw/wipe debt on a position.
    ///
    /// Collateral comes from (or returns to) `collateral_owner`'s free balance;
    /// stablecoin is minted to (or burned from) `stablecoin_owner`.
    #[allow(clippy::too_many_arguments)]
    pub fn adjust_position(
        &mut self,
        caller: &Address,
        pool_id: &PoolId,
        position_owner: &Address,
        collateral_owner: &Address,
        stablecoin_owner: &Address,
        collateral_delta: i128,
        debt_share_delta: i128,
    ) -> Result<()> {
        self.ensure_not_paused()?;
        self.ensure_live()?;
        let pool = self.pool(pool_id)?;
        let rate = pool.debt_accumulated_rate;

        if collateral_delta > 0 {
            self.ensure_can_modify(collateral_owner, caller)?;
        }
        if collateral_delta < 0 || debt_share_delta > 0 {
            self.ensure_can_modify(position_owner, caller)?;
        }
        if debt_share_delta < 0 {
            self.ensure_can_modify(stablecoin_owner, caller)?;
        }

        let position = Self::position_after(&self.position(pool_id, position_owner), collateral_delta, debt_share_delta)?;
        let total_debt_share = pool.total_debt_share.checked_add_signed(debt_share_delta)?;
        let (value, burn) = signed_value(debt_share_delta, rate);
        let pool_issued = self.pool_stablecoin_issued(pool_id).checked_apply(value, burn)?;
        let total_issued = self.state.total_stablecoin_issued.checked_apply(value, burn)?;
        let free = self.free_collateral_after(pool_id, collateral_owner, negate(collateral_delta)?)?;

        let position_debt = position.debt_value(rate);
        if debt_share_delta > 0 {
            if total_debt_share.mul_ray(rate) > pool.debt_ceiling {
                return Err(Error::PoolDebtCeilingExceeded);
            }
            if total_issued > self.state.total_debt_ceiling {
                return Err(Error::TotalDebtCeilingExceeded);
            }
            if position_debt > pool.position_debt_ceiling {
                return Err(Error::PositionDebtCeilingExceeded);
            }
        }
        if (debt_share_delta > 0 || collateral_delta < 0)
            && !position.is_safe(rate, pool.price_with_safety_margin)
        {
            return Err(Error::NotSafe);
        }
        if !position.respects_floor(rate, pool.debt_floor) {
            return Err(Error::DebtFloor);
        }
        // Stablecoin balance checked last: a wipe larger than the balance is a transfer failure.
        let stablecoin = self.stablecoin_after(stablecoin_owner, value, burn)?;

        if let Some(pool) = self.state.pools.get_mut(pool_id) {
            pool.total_debt_share = total_debt_share;
        }
        self.state.set_position(*pool_id, *position_owner, position);
        self.state.set_collateral(*pool_id, *collateral_owner, free);
        self.state.set_stablecoin(*stablecoin_owner, stablecoin);
        self.state.pool_stablecoin_issued.insert(*pool_id, pool_issued);
        self.state.total_stablecoin_issued = total_issued;

        self.emit(ProtocolEvent::PositionAdjusted(PositionAdjustedEvent {
            pool: *pool_id,
            position_owner: *position_owner,
            collateral_owner: *collateral_owner,
            stablecoin_owner: *stablecoin_owner,
            collateral_delta,
            debt_share_delta,
            locked_collateral: position.locked_collateral,
            debt_share: position.debt_share,
        }));
        tracing::debug!(
            pool = %pool_id,
            owner = %position_owner.short(),
            collateral_delta,
            debt_share_delta,
            "position adjusted"
        );
        Ok(())
    }

    /// Move a slice of `src`'s position into `dst`'s position
    pub fn move_position(
        &mut self,
        caller: &Address,
        pool_id: &PoolId,
        src: &Address,
        dst: &Address,
        collateral_delta: i128,
        debt_share_delta: i128,
    ) -> Result<()> {
        self.ensure_not_paused()?;
        self.ensure_live()?;
        let pool = self.pool(pool_id)?;
        let rate = pool.debt_accumulated_rate;
        let spot = pool.price_with_safety_margin;
        self.ensure_can_modify(src, caller)?;
        self.ensure_can_modify(dst, caller)?;
        validate_transfer(src, dst)?;

        let src_position = Self::position_after(
            &self.position(pool_id, src),
            negate(collateral_delta)?,
            negate(debt_share_delta)?,
        )?;
        let dst_position = Self::position_after(&self.position(pool_id, dst), collateral_delta, debt_share_delta)?;

        if !src_position.is_safe(rate, spot) {
            return Err(Error::NotSafeSrc);
        }
        if !dst_position.is_safe(rate, spot) {
            return Err(Error::NotSafeDst);
        }
        if !src_position.respects_floor(rate, pool.debt_floor) {
            return Err(Error::DebtFloorSrc);
        }
        if !dst_position.respects_floor(rate, pool.debt_floor) {
            return Err(Error::DebtFloorDst);
        }
        if dst_position.debt_value(rate) > pool.position_debt_ceiling {
            return Err(Error::PositionDebtCeilingExceededDst);
        }

        self.state.set_position(*pool_id, *src, src_position);
        self.state.set_position(*pool_id, *dst, dst_position);
        self.emit(ProtocolEvent::PositionMoved(PositionMovedEvent {
            pool: *pool_id,
            src: *src,
            dst: *dst,
            collateral_delta,
            debt_share_delta,
        }));
        tracing::debug!(
            pool = %pool_id,
            src = %src.short(),
            dst = %dst.short(),
            collateral_delta,
            debt_share_delta,
            "position moved"
        );
        Ok(())
    }

    /// Forcibly adjust a position, booking its debt as bad debt.
    ///
    /// Collateral removed from the position is credited to
    /// `collateral_creditor`; the debt value removed is recorded as bad debt
    /// of `debt_creditor`. No safety check is applied.
    #[allow(clippy::too_many_arguments)]
    pub fn confiscate_position(
        &mut self,
        caller: &Address,
        pool_id: &PoolId,
        position_owner: &Address,
        collateral_creditor: &Address,
        debt_creditor: &Address,
        collateral_delta: i128,
        debt_share_delta: i128,
    ) -> Result<()> {
        ensure_any_role(self.access(), &[Role::LiquidationEngine, Role::Settlement], caller)?;
        self.ensure_not_paused()?;
        let pool = self.pool(pool_id)?;
        let rate = pool.debt_accumulated_rate;

        let position = Self::position_after(&self.position(pool_id, position_owner), collateral_delta, debt_share_delta)?;
        let total_debt_share = pool.total_debt_share.checked_add_signed(debt_share_delta)?;
        let free = self.free_collateral_after(pool_id, collateral_creditor, negate(collateral_delta)?)?;
        let (value, debt_removed) = signed_value(debt_share_delta, rate);
        let pool_issued = self.pool_stablecoin_issued(pool_id).checked_apply(value, debt_removed)?;
        // Removed debt becomes bad debt; added debt cancels bad debt.
        let bad_debt = self.system_bad_debt(debt_creditor).checked_apply(value, !debt_removed)?;
        let unbacked = self.state.total_unbacked_stablecoin.checked_apply(value, !debt_removed)?;

        if let Some(pool) = self.state.pools.get_mut(pool_id) {
            pool.total_debt_share = total_debt_share;
        }
        self.state.set_position(*pool_id, *position_owner, position);
        self.state.set_collateral(*pool_id, *collateral_creditor, free);
        self.state.set_bad_debt(*debt_creditor, bad_debt);
        self.state.pool_stablecoin_issued.insert(*pool_id, pool_issued);
        self.state.total_unbacked_stablecoin = unbacked;

        self.emit(ProtocolEvent::PositionConfiscated(PositionConfiscatedEvent {
            pool: *pool_id,
            position_owner: *position_owner,
            collateral_creditor: *collateral_creditor,
            debt_creditor: *debt_creditor,
            collateral_delta,
            debt_share_delta,
            debt_value: value,
        }));
        tracing::debug!(
            pool = %pool_id,
            owner = %position_owner.short(),
            collateral_delta,
            debt_share_delta,
            "position confiscated"
        );
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SYSTEM DEBT
    // ═══════════════════════════════════════════════════════════════════════════

    /// Mint stablecoin to `to` while recording the same value as bad debt of `from`
    pub fn mint_unbacked_stablecoin(&mut self, caller: &Address, from: &Address, to: &Address, value: Rad) -> Result<()> {
        ensure_role(self.access(), Role::Mintable, caller)?;
        self.ensure_not_paused()?;
        validate_non_zero_rad(value)?;
        validate_address(from, "from")?;
        validate_address(to, "to")?;

        let bad_debt = self.system_bad_debt(from).checked_add(value)?;
        let unbacked = self.state.total_unbacked_stablecoin.checked_add(value)?;
        let balance = self.stablecoin(to).checked_add(value)?;
        let total = self.state.total_stablecoin_issued.checked_add(value)?;

        self.state.set_bad_debt(*from, bad_debt);
        self.state.set_stablecoin(*to, balance);
        self.state.total_unbacked_stablecoin = unbacked;
        self.state.total_stablecoin_issued = total;
        self.emit(ProtocolEvent::UnbackedStablecoinMinted(UnbackedStablecoinMintedEvent {
            from: *from,
            to: *to,
            value,
        }));
        tracing::debug!(from = %from.short(), to = %to.short(), %value, "unbacked stablecoin minted");
        Ok(())
    }

    /// Net the caller's own bad debt against its stablecoin
    pub fn settle_system_bad_debt(&mut self, caller: &Address, value: Rad) -> Result<()> {
        ensure_role(self.access(), Role::DebtEngine, caller)?;
        self.ensure_not_paused()?;
        validate_non_zero_rad(value)?;

        let available = self.system_bad_debt(caller);
        let bad_debt = available.checked_sub(value).map_err(|_| Error::InsufficientBadDebt {
            required: value.to_string(),
            available: available.to_string(),
        })?;
        let balance = self.stablecoin_after(caller, value, true)?;
        let unbacked = self.state.total_unbacked_stablecoin.checked_sub(value)?;
        let total = self.state.total_stablecoin_issued.checked_sub(value)?;

        self.state.set_bad_debt(*caller, bad_debt);
        self.state.set_stablecoin(*caller, balance);
        self.state.total_unbacked_stablecoin = unbacked;
        self.state.total_stablecoin_issued = total;
        self.emit(ProtocolEvent::BadDebtSettled(BadDebtSettledEvent {
            account: *caller,
            value,
        }));
        tracing::debug!(account = %caller.short(), %value, "bad debt settled");
        Ok(())
    }

    /// Raise a pool's accumulated rate and credit the accrued fee to `recipient`
    pub fn accrue_stability_fee(&mut self, caller: &Address, pool_id: &PoolId, recipient: &Address, rate_delta: Ray) -> Result<()> {
        ensure_role(self.access(), Role::StabilityFeeCollector, caller)?;
        self.ensure_not_paused()?;
        self.ensure_live()?;
        validate_address(recipient, "recipient")?;
        let pool = self.pool(pool_id)?;

        let new_rate = pool.debt_accumulated_rate.checked_add(rate_delta)?;
        let value = pool.total_debt_share.mul_ray(rate_delta);
        let balance = self.stablecoin(recipient).checked_add(value)?;
        let pool_issued = self.pool_stablecoin_issued(pool_id).checked_add(value)?;
        let total = self.state.total_stablecoin_issued.checked_add(value)?;

        if let Some(pool) = self.state.pools.get_mut(pool_id) {
            pool.debt_accumulated_rate = new_rate;
        }
        self.state.set_stablecoin(*recipient, balance);
        self.state.pool_stablecoin_issued.insert(*pool_id, pool_issued);
        self.state.total_stablecoin_issued = total;
        self.emit(ProtocolEvent::StabilityFeeAccrued(StabilityFeeAccruedEvent {
            pool: *pool_id,
            recipient: *recipient,
            rate_delta,
            value,
            new_rate,
        }));
        tracing::debug!(pool = %pool_id, %rate_delta, %value, "stability fee accrued");
        Ok(())
    }
}
