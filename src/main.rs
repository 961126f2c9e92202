fn main() -> anyhow::Result<()> {
    camrec_lib::run()
}
