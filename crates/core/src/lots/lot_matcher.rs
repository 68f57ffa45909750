//! Split-adjusted allocation of sale shares to purchase lots.

use log::{debug, warn};
use rust_decimal::Decimal;

use super::{unit_price, LotAllocation, LotAllocationStrategy, LotKey};
use crate::constants::PRICE_SCALE;
use crate::errors::{LedgerError, Result};
use crate::ledger::{AccountId, EntryId, Ledger};

/// Matches sales against purchases on a borrowed [`Ledger`].
///
/// Lots are created and resized through the ledger so the cached remaining
/// shares of every purchase stay current.
pub struct TaxLotMatcher<'a> {
    ledger: &'a mut Ledger,
}

impl<'a> TaxLotMatcher<'a> {
    pub fn new(ledger: &'a mut Ledger) -> Self {
        TaxLotMatcher { ledger }
    }

    pub fn ledger(&self) -> &Ledger {
        &*self.ledger
    }

    /// Unadjusted shares of `purchase` not consumed by any lot.
    pub fn remaining_shares(&self, purchase: EntryId) -> Decimal {
        self.ledger.remaining_shares(purchase)
    }

    /// Unadjusted shares of `purchase` available to a sale booked in `account`.
    pub fn remaining_shares_for_account(&self, purchase: EntryId, account: AccountId) -> Decimal {
        remaining_shares_for_account(self.ledger(), purchase, account)
    }

    /// Adds up to `demand` sale-date shares to the lot and returns the demand
    /// left over. Never fails: unknown lots and exhausted purchases allocate
    /// nothing.
    ///
    /// The lot may grow only as far as its own purchase shares plus what the
    /// purchase has left can back after the splits in between, rounded down.
    pub fn allocate_shares(&mut self, key: LotKey, demand: Decimal) -> Decimal {
        if demand <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let Some(lot) = self.ledger.lot(key).copied() else {
            warn!("Cannot allocate to unknown lot {}", key);
            return demand;
        };
        let Some(account) = self.ledger.entry_transaction(key.sale).map(|tx| tx.account) else {
            warn!("Sale {} of lot {} has no transaction", key.sale, key);
            return demand;
        };

        let context = self.ledger.lot_split_context(key);
        let remaining = self.remaining_shares_for_account(key.purchase, account);
        let backed = self.ledger.covered_shares(
            context.security,
            lot.purchase_shares + remaining,
            context.purchase_date,
            context.sale_date,
        );
        let available = (backed - lot.adjusted_shares).max(Decimal::ZERO);
        let allocated = demand.min(available);
        if allocated.is_zero() {
            return demand;
        }
        if let Err(err) = self
            .ledger
            .set_lot_adjusted_shares(key, lot.adjusted_shares + allocated)
        {
            warn!("Failed to resize lot {}: {}", key, err);
            return demand;
        }
        debug_assert!(allocated <= demand.min(available));
        debug_assert!(
            self.remaining_shares_for_account(key.purchase, account) >= remaining.min(Decimal::ZERO),
            "allocation to lot {} overdrew purchase {}",
            key,
            key.purchase
        );
        debug!(
            "Allocated {} shares of purchase {} to sale {}",
            allocated, key.purchase, key.sale
        );
        demand - allocated
    }

    /// Fills the sale's outstanding demand from `candidates`, strictly in the
    /// order given. Lots are created on demand; a new lot that receives no
    /// shares is dropped again.
    pub fn allocate_lots(&mut self, sale: EntryId, candidates: &[EntryId]) -> Result<LotAllocation> {
        let quantity = self
            .ledger
            .entry(sale)
            .ok_or(LedgerError::EntryNotFound(sale))?
            .asset_quantity_or_zero();
        let covered: Decimal = self.ledger.lots_by_sale(sale).map(|lot| lot.adjusted_shares).sum();
        let mut demand = (-quantity - covered).max(Decimal::ZERO);

        let mut allocation = LotAllocation::default();
        for &purchase in candidates {
            if demand.is_zero() {
                break;
            }
            if purchase == sale {
                continue;
            }
            let key = LotKey::new(purchase, sale);
            let created = self.ledger.lot(key).is_none();
            if created {
                self.ledger.insert_lot(purchase, sale)?;
            }
            let rest = self.allocate_shares(key, demand);
            if rest < demand {
                if created {
                    allocation.created.push(key);
                } else {
                    allocation.updated.push(key);
                }
            } else if created {
                self.ledger.remove_lot(key)?;
            }
            demand = rest;
        }
        allocation.unallocated = demand;
        Ok(allocation)
    }

    /// Matches the sale against the unsold purchases of its account and
    /// security, ordered by `strategy`.
    pub fn allocate_with_strategy(
        &mut self,
        sale: EntryId,
        strategy: LotAllocationStrategy,
    ) -> Result<LotAllocation> {
        let tx = self
            .ledger
            .entry_transaction(sale)
            .ok_or(LedgerError::DetachedEntry(sale))?;
        let security = tx.security.ok_or(LedgerError::MissingSecurity(tx.id))?;
        let mut candidates = self.ledger.unsold_purchases(tx.account, security, tx.date);
        strategy.sort(&*self.ledger, &mut candidates);
        self.allocate_lots(sale, &candidates)
    }

    /// True when a share-removing entry is not fully covered by lots.
    pub fn is_missing_lots(&self, sale: EntryId) -> bool {
        is_missing_lots(self.ledger(), sale)
    }

    // --- Lot helpers ---

    /// Purchase cost per share in sale-date terms.
    pub fn purchase_price(&self, key: LotKey) -> Option<Decimal> {
        let price = unit_price(&*self.ledger, key.purchase)?;
        let context = self.ledger.lot_split_context(key);
        let ratio = self
            .ledger
            .split_ratio(context.security, context.purchase_date, context.sale_date);
        Some(ratio.revert(price).round_dp(PRICE_SCALE))
    }

    /// All shares bought by the lot's purchase, in sale-date terms.
    pub fn total_purchase_shares(&self, key: LotKey) -> Decimal {
        let shares = self
            .ledger
            .entry(key.purchase)
            .map_or(Decimal::ZERO, |entry| entry.asset_quantity_or_zero());
        let context = self.ledger.lot_split_context(key);
        self.ledger
            .apply_split(context.security, shares, context.purchase_date, context.sale_date)
    }

    /// Shares of the lot's purchase still available to its sale, in sale-date
    /// terms.
    pub fn remaining_purchase_shares(&self, key: LotKey) -> Decimal {
        let Some(account) = self.ledger.entry_transaction(key.sale).map(|tx| tx.account) else {
            return Decimal::ZERO;
        };
        let context = self.ledger.lot_split_context(key);
        self.ledger.covered_shares(
            context.security,
            self.remaining_shares_for_account(key.purchase, account),
            context.purchase_date,
            context.sale_date,
        )
    }
}

/// Unadjusted shares of `purchase` available to a sale booked in `account`.
///
/// Shares moved to another account by a transfer can only be sold there, so
/// for a foreign account this is what was transferred in minus what was
/// already sold from it.
pub fn remaining_shares_for_account(ledger: &Ledger, purchase: EntryId, account: AccountId) -> Decimal {
    match ledger.entry_transaction(purchase) {
        Some(tx) if tx.account == account => return ledger.remaining_shares(purchase),
        Some(_) => {}
        None => return Decimal::ZERO,
    }
    let booked_in = |entry: Option<EntryId>| {
        entry
            .and_then(|id| ledger.entry_transaction(id))
            .map_or(false, |tx| tx.account == account)
    };
    let mut remaining = Decimal::ZERO;
    for lot in ledger.lots_by_purchase(purchase) {
        let related = ledger.entry(lot.sale).and_then(|sale| sale.related);
        if related.is_some() && booked_in(related) {
            remaining += lot.purchase_shares;
        }
        if booked_in(Some(lot.sale)) {
            remaining -= lot.purchase_shares;
        }
    }
    remaining
}

/// True when a share-removing entry is not fully covered by lots.
///
/// A share-adding transfer leg is missing lots when its opposite leg is.
/// Entries whose category action never consumes lots are never missing any.
pub fn is_missing_lots(ledger: &Ledger, sale: EntryId) -> bool {
    let Some(entry) = ledger.entry(sale) else {
        return false;
    };
    let quantity = match entry.asset_quantity {
        Some(quantity) if !quantity.is_zero() => quantity,
        _ => return false,
    };
    if !entry.is_transfer() {
        if let Some(action) = ledger.security_action(entry) {
            if !action.requires_lots() {
                return false;
            }
        }
    }
    if quantity < Decimal::ZERO {
        let covered: Decimal = ledger.lots_by_sale(sale).map(|lot| lot.adjusted_shares).sum();
        return quantity + covered != Decimal::ZERO;
    }
    match entry.related {
        Some(related) => is_missing_lots(ledger, related),
        None => false,
    }
}
