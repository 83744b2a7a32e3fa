pub mod mariadb_controller;
