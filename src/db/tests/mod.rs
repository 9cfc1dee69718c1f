mod kv;
mod migrations;
