mod pixel_image_test;
