fn main() -> anyhow::Result<()> {
  voxrelay::run()
}
