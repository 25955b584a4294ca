pub mod earnings_service;
pub mod redeem_service;
pub mod task_service;
pub mod withdraw_service;
