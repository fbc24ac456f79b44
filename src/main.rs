use notepad::StorageError;

fn main() {
    if let Err(err) = notepad::cli::run() {
        eprintln!("error: {err:#}");
        let code = err
            .downcast_ref::<StorageError>()
            .map(StorageError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}
