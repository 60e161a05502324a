use anyhow::Result;

fn main() -> Result<()> {
    codexam_judge::cli::run()
}
