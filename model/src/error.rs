use thiserror::Error;

/// Reasons a limit-order transaction is rejected. The set and its variant
/// names are consensus-critical: nodes must agree on which code a given
/// transaction fails with.
#[derive(Copy, Clone, Debug, Eq, Error, PartialEq)]
pub enum ExchangeError {
    #[error("an order cannot buy and sell the same coin")]
    CannotBuyAndSellSameCoin,
    #[error("unrecognised order operation type")]
    InvalidOperationType,
    #[error("unrecognised or disallowed order fill type")]
    InvalidFillType,
    #[error("no profile exists for the creator of the coin being bought")]
    BuyingDAOCoinCreatorMissingProfile,
    #[error("no profile exists for the creator of the coin being sold")]
    SellingDAOCoinCreatorMissingProfile,
    #[error("invalid exchange rate")]
    InvalidExchangeRate,
    #[error("invalid order quantity")]
    InvalidQuantity,
    #[error("total cost overflows uint256")]
    TotalCostOverflowsUint256,
    #[error("total cost is less than one base unit")]
    TotalCostIsLessThanOneNano,
    #[error("insufficient native coin to open order")]
    InsufficientDESOToOpenOrder,
    #[error("insufficient DAO coins to open order")]
    InsufficientDAOCoinsToOpenOrder,
    #[error("order to cancel not found")]
    ToCancelNotFound,
    #[error("order to cancel belongs to another transactor")]
    ToCancelNotYours,
    #[error("transactor would match their own order")]
    MatchingOwnOrder,
    #[error("fill-or-kill order could not be fully filled")]
    FillOrKillOrderUnfulfilled,
    #[error("fee does not equal the minimum transaction fee")]
    FeeNanosBelowMinTxFee,
    #[error("native inputs do not cover native outputs plus fee")]
    OverspendingDESO,
    #[error("referenced bidder input no longer exists")]
    BidderInputNoLongerExists,
    #[error("input is not owned by the public key it was attributed to")]
    InputWithPublicKeyDifferentFromTxnPublicKey,
    #[error("total input minus total output does not equal the fee")]
    TotalInputMinusTotalOutputNotEqualToFee,
    #[error("transaction or record bytes are malformed")]
    InvalidTransactionEncoding,
    #[error("coin transfer could not be applied")]
    CoinTransferFailed,
}
