use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    palaver::cli::main()
}
