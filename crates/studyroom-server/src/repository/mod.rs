pub mod room_repository;
