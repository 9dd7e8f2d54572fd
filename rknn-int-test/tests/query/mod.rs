mod bichromatic_test;
mod monochromatic_test;
