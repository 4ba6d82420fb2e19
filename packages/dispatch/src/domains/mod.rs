pub mod blood;
