pub mod cloud;
pub mod local;
pub mod storage;
pub mod upload_service;
pub mod validator;
