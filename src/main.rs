use anyhow::Context;

fn main() -> anyhow::Result<()> {
    bugreport::init_logging();
    bugreport::run().context("bugreport failed")
}
