use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    lazy_shar::example_apps::run_shar_inspect(std::env::args().skip(1))
}
