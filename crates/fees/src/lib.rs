pub mod estimator;
pub mod profiles;
pub mod wait;

pub use estimator::{
    format_gwei, format_native, EstimateOptions, FeeError, FeeEstimate, FeeEstimator,
    FEE_HISTORY_BLOCKS, MIN_PRIORITY_FEE_WEI, REWARD_PERCENTILE,
};
pub use profiles::{ChainFeeProfile, ProfileTable};
pub use wait::wait_for_fee_below;
