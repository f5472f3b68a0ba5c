use vergen::Emitter;
use vergen_git2::Git2Builder;

// Only the commit hash is embedded, for `--version`.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    match Git2Builder::default().sha(true).build() {
        Ok(git2) => {
            Emitter::default().add_instructions(&git2)?.emit()?;
        }
        Err(_) => println!("cargo:rustc-env=VERGEN_GIT_SHA=unknown"),
    }
    Ok(())
}
