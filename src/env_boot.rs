use dotenv::dotenv;

/// Load `CATALOG_ENV_FILE` if set, else `.env` from the working directory,
/// else `.env` at the crate root. Missing files are not an error.
pub fn ensure_dotenv() {
    if let Some(path) = std::env::var_os("CATALOG_ENV_FILE") {
        if dotenv::from_path(&path).is_ok() {
            return;
        }
        eprintln!("CATALOG_ENV_FILE {:?} could not be loaded", path);
    }
    if dotenv().is_ok() {
        return;
    }
    let candidate = concat!(env!("CARGO_MANIFEST_DIR"), "/.env");
    let _ = dotenv::from_filename(candidate);
}
