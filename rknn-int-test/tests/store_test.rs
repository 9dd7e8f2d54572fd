#[ctor::ctor]
fn init() {
    colog::init();
}

mod store;
