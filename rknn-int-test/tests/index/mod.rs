mod rtree_test;
mod vortree_test;
