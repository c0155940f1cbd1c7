fn main() {
    drinkmaster_lib::run()
}
