mod node_store_test;
mod snapshot_test;
