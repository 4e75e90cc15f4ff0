fn main() {
    malefirc::start()
}
