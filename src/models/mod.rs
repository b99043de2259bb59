pub mod private_url;
