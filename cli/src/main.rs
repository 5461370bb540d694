//! The main entrypoint for ukimenu, which just performs global initialization
//! and then calls out into the library.

fn main() {
    if let Err(e) = ukimenu_lib::cli::run_from_iter(std::env::args_os()) {
        tracing::error!("{:#}", e);
        std::process::exit(ukimenu_lib::exit::exit_code(&e));
    }
}
