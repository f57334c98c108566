mod data;
mod elem;
