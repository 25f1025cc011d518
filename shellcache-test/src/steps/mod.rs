mod given;
mod then;
mod when;
