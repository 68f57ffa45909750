/// Default number of decimal places for share quantities
pub const DEFAULT_SHARE_SCALE: u32 = 6;

/// Largest share scale accepted from settings
pub const MAX_SHARE_SCALE: u32 = 8;

/// Decimal places kept on split-adjusted share quantities so that
/// reverting a split recovers the original quantity
pub const ADJUSTED_SHARE_SCALE: u32 = 16;

/// Decimal places for purchase prices
pub const PRICE_SCALE: u32 = 6;
