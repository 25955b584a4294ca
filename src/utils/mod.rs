pub mod notification_sender;
