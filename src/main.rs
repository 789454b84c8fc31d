fn main() {
    medicore_lib::run()
}
