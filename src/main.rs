fn main() -> anyhow::Result<()> {
    frontdesk::cli::run()
}
